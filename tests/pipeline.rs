use reservoir_dash::config::DashboardConfig;
use reservoir_dash::data::{
    parse, AggregatePoint, AggregationError, AggregationSpec, DataProcessor, DiagnosticCode,
    PointKey, RawRecord,
};
use reservoir_dash::pipeline::{DatasetStatus, Pipeline};
use std::fs;

fn reservoir(date: &str, poondi: &str) -> RawRecord {
    RawRecord::from_pairs([("Date", date), ("POONDI", poondi)])
}

#[test]
fn yearly_means_of_one_reservoir() {
    let records = vec![
        reservoir("01-01-2020", "50"),
        reservoir("01-01-2020", "60"),
        reservoir("01-01-2021", "70"),
    ];
    let spec = AggregationSpec::yearly_means("Date", ["POONDI"]);

    let result = DataProcessor::aggregate(&records, &spec).unwrap();
    let json = serde_json::to_value(&result.points).unwrap();
    assert_eq!(
        json,
        serde_json::json!([
            { "key": 2020, "values": { "POONDI": 55.0 } },
            { "key": 2021, "values": { "POONDI": 70.0 } }
        ])
    );
}

#[test]
fn slash_dates_are_skipped() {
    let records = vec![reservoir("2020/01/01", "50"), reservoir("01-01-2020", "10")];
    let spec = AggregationSpec::yearly_means("Date", ["POONDI"]);

    let result = DataProcessor::aggregate(&records, &spec).unwrap();
    assert_eq!(result.points.len(), 1);
    assert_eq!(result.points[0].as_mean().unwrap().values["POONDI"], 10.0);
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].code, DiagnosticCode::BadDateFormat);
}

#[test]
fn range_becomes_interpolated_summary() {
    let records = vec![RawRecord::from_pairs([("Station", "Adyar"), ("Range", "10 - 20")])];
    let spec = AggregationSpec::five_number("Station", "Range");

    let result = DataProcessor::aggregate(&records, &spec).unwrap();
    let point = result.points[0].as_five_number().unwrap();
    assert_eq!(point.summary.min, 10.0);
    assert_eq!(point.summary.q1, 12.5);
    assert_eq!(point.summary.median, 15.0);
    assert_eq!(point.summary.q3, 17.5);
    assert_eq!(point.summary.max, 20.0);
}

#[test]
fn empty_records_are_fatal() {
    let spec = AggregationSpec::yearly_means("Date", ["POONDI"]);
    let err = DataProcessor::aggregate(&[], &spec).unwrap_err();
    assert_eq!(err, AggregationError::EmptyInput);
    assert_eq!(err.code(), "empty-input");
}

#[test]
fn unknown_column_is_fatal() {
    let records = vec![reservoir("01-01-2020", "50")];
    let spec = AggregationSpec::yearly_means("Date", ["FOO"]);

    let err = DataProcessor::aggregate(&records, &spec).unwrap_err();
    assert_eq!(err, AggregationError::MissingColumns(vec!["FOO".to_string()]));
}

fn noisy_levels_csv() -> String {
    let mut text = String::from("Date,POONDI,CHOLAVARAM,REDHILLS,CHEMBARAMBAKKAM\n");
    let years = [2011, 2004, 2019, 2007, 2004, 2015, 2011, 2019];
    for (i, year) in years.iter().enumerate() {
        let day = i % 28 + 1;
        text.push_str(&format!("{day:02}-03-{year},{},1.5,{},0\n", i * 10, 200 + i));
        match i % 4 {
            0 => text.push_str(&format!("{day:02}/03/{year},1,1,1,1\n")),
            1 => text.push_str(&format!("{day:02}-03-{year},,1,1,1\n")),
            2 => text.push_str(&format!("{day:02}-03-{year},7x,1,1,1\n")),
            _ => text.push_str(&format!("{day:02}-03-{year},1,1\n")),
        }
    }
    text
}

#[test]
fn years_strictly_ascending() {
    let spec = AggregationSpec::preset("reservoir-levels").unwrap();
    let DatasetStatus::Ready(result) = Pipeline::run(&noisy_levels_csv(), true, &spec) else {
        panic!("expected ready");
    };

    let keys: Vec<&PointKey> = result.mean_points().map(|p| &p.key).collect();
    assert_eq!(keys.len(), 5);
    assert!(keys.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(keys[0], &PointKey::Year(2004));
    for point in result.mean_points() {
        assert_eq!(point.values.len(), 4);
    }
}

#[test]
fn skipped_and_folded_rows_add_up() {
    let parsed = parse(&noisy_levels_csv(), true).unwrap();
    let spec = AggregationSpec::preset("reservoir-levels").unwrap();

    let result = DataProcessor::aggregate(&parsed.records, &spec).unwrap();
    assert_eq!(result.rows_in, parsed.records.len());
    assert_eq!(result.rows_folded, 8);
    assert_eq!(result.rows_folded + result.diagnostics.len(), parsed.records.len());
    assert_eq!(parsed.diagnostics.len(), 2);
}

#[test]
fn aggregation_is_repeatable() {
    let parsed = parse(&noisy_levels_csv(), true).unwrap();
    let spec = AggregationSpec::preset("reservoir-levels").unwrap();

    let first = DataProcessor::aggregate(&parsed.records, &spec).unwrap();
    let second = DataProcessor::aggregate(&parsed.records, &spec).unwrap();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn summaries_are_ordered_linear_interpolations() {
    let text = "Station,Range\n\
        Adyar,2.1 - 8.4\n\
        Ambattur,12 - 3\n\
        Alandur,0 - 0\n\
        Perungudi,1.25-9.75\n\
        Kodambakkam,13.7 - 15.2\n";
    let spec = AggregationSpec::preset("ground-water-level").unwrap();
    let DatasetStatus::Ready(result) = Pipeline::run(text, true, &spec) else {
        panic!("expected ready");
    };

    assert_eq!(result.points.len(), 5);
    for point in result.five_number_points() {
        let s = point.summary;
        assert!(s.min <= s.q1 && s.q1 <= s.median && s.median <= s.q3 && s.q3 <= s.max);
        let spread = s.max - s.min;
        assert_eq!(s.q1, s.min + 0.25 * spread);
        assert_eq!(s.median, s.min + 0.5 * spread);
        assert_eq!(s.q3, s.min + 0.75 * spread);
    }
    let ambattur = result.points[1].as_five_number().unwrap();
    assert_eq!((ambattur.summary.min, ambattur.summary.max), (3.0, 12.0));
}

#[test]
fn year_first_dates_read_as_day_month_year() {
    let records = vec![reservoir("2020-01-15", "5")];
    let spec = AggregationSpec::yearly_means("Date", ["POONDI"]);

    let result = DataProcessor::aggregate(&records, &spec).unwrap();
    assert_eq!(result.points[0].as_mean().unwrap().key, PointKey::Year(15));
}

#[test]
fn population_growth_keeps_row_order() {
    let text = "year,growth,growthRate\n2011,302000,7.0\n2001,,\n1991,240000,6.2\n";
    let spec = AggregationSpec::preset("population-growth").unwrap();
    let DatasetStatus::Ready(result) = Pipeline::run(text, true, &spec) else {
        panic!("expected ready");
    };

    let labels: Vec<String> = result
        .points
        .iter()
        .map(|p| match p {
            AggregatePoint::Mean(m) => serde_json::to_string(&m.key).unwrap(),
            AggregatePoint::FiveNumber(_) => panic!("unexpected summary"),
        })
        .collect();
    assert_eq!(labels, vec!["\"2011\"", "\"1991\""]);
    assert_eq!(result.diagnostics[0].row, 1);
}

#[test]
fn blank_lines_keep_diagnostics_traceable() {
    let text = "Date,POONDI,REDHILLS\n\
        01-01-2004,3.9,268\n\
        \n\
        02-01-2004,3.9\n\
        \n\
        01-01-2005,bad,268\n";
    let spec = AggregationSpec::yearly_means("Date", ["POONDI", "REDHILLS"]);
    let status = Pipeline::run(text, true, &spec);

    let found: Vec<(usize, Option<u64>, DiagnosticCode)> = status
        .diagnostics()
        .iter()
        .map(|d| (d.row, d.line, d.code))
        .collect();
    assert_eq!(
        found,
        vec![
            (1, Some(4), DiagnosticCode::RowFieldCountMismatch),
            (1, Some(4), DiagnosticCode::MissingField),
            (2, Some(6), DiagnosticCode::BadNumericValue),
        ]
    );
}

#[test]
fn dashboard_manifest_runs_every_dataset() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("levels.csv"), noisy_levels_csv()).unwrap();
    fs::write(dir.path().join("population.csv"), "year,population\n").unwrap();
    fs::write(dir.path().join("ground.csv"), "Station,Range\nAdyar,unknown\n").unwrap();
    fs::write(
        dir.path().join("dashboard.json"),
        r#"{ "datasets": [
            { "name": "levels", "path": "levels.csv", "preset": "reservoir-levels" },
            { "name": "population", "path": "population.csv", "preset": "population" },
            { "name": "ground", "path": "ground.csv", "preset": "ground-water-level" },
            { "name": "rainfall", "path": "missing.csv", "preset": "reservoir-rainfall" }
        ] }"#,
    )
    .unwrap();

    let config = DashboardConfig::load(dir.path().join("dashboard.json")).unwrap();
    let reports = Pipeline::run_all(&config.jobs().unwrap());

    let states: Vec<(&str, &str)> = reports
        .iter()
        .map(|r| (r.name.as_str(), r.status.state()))
        .collect();
    assert_eq!(
        states,
        vec![
            ("levels", "ready"),
            ("population", "error"),
            ("ground", "no-data"),
            ("rainfall", "error"),
        ]
    );

    let json = serde_json::to_value(&reports).unwrap();
    assert_eq!(json[1]["code"], "empty-input");
    assert_eq!(json[2]["message"], "no valid data after processing");
    assert_eq!(json[3]["code"], "read-failed");
}
