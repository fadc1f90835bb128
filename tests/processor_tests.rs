use chrono::NaiveDate;
use healthrun::{ConfigurationError, Error, HrAggregate, ParseError, Processor};
use std::fs;
use std::path::PathBuf;

fn fixture() -> PathBuf {
    PathBuf::from(format!(
        "{}/tests/resource/export.xml",
        env!("CARGO_MANIFEST_DIR")
    ))
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_sizes_match_source_records() {
        let p = Processor::open(fixture()).expect("Failed to load export");
        assert_eq!(p.heart_rates().len(), 9, "resting HR and steps are not heart-rate samples");
        assert_eq!(p.runs().len(), 4, "walking and cycling are not runs");
    }

    #[test]
    fn test_tables_are_ordered() {
        let p = Processor::open(fixture()).expect("Failed to load export");
        assert!(p.heart_rates().windows(2).all(|w| w[0].time <= w[1].time));
        assert!(p.runs().windows(2).all(|w| w[0].start <= w[1].start));

        let dates: Vec<NaiveDate> = p.runs().iter().map(|r| r.date).collect();
        assert_eq!(
            dates,
            vec![date(2021, 8, 9), date(2021, 8, 9), date(2021, 8, 11), date(2021, 8, 13)]
        );
    }

    #[test]
    fn test_pace_is_duration_over_distance() {
        let p = Processor::open(fixture()).expect("Failed to load export");
        for run in p.runs() {
            let distance = run.distance.expect("every fixture run has a distance");
            assert_eq!(run.pace, Some(run.duration / distance));
            assert_eq!(run.speed, Some(60.0 * distance / run.duration));
        }

        let metric = &p.runs()[2];
        assert!((metric.distance.unwrap() - 8.0 / 1.609_344).abs() < 1e-12);
        assert!((metric.duration - 45.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_heart_rate_join() {
        let p = Processor::open(fixture()).expect("Failed to load export");
        let runs = p.runs();

        // 18:56 and 19:10 fall inside; 18:50 is before and 19:24 is the end instant.
        assert_eq!(runs[0].avg_hr, Some(150.0));
        assert_eq!(runs[0].max_hr, Some(160.0));
        assert_eq!(p.samples_during(&runs[0]).len(), 2);
        assert_eq!(p.find_hr(&runs[0], HrAggregate::Median), Some(150.0));

        assert_eq!(runs[1].avg_hr, Some(170.0));
        assert_eq!(runs[1].max_hr, Some(175.0));

        assert_eq!(runs[2].avg_hr, Some(152.0));
        assert_eq!(runs[2].max_hr, Some(154.0));

        assert_eq!(runs[3].avg_hr, None);
        assert_eq!(runs[3].max_hr, None);
        assert!(p.samples_during(&runs[3]).is_empty());
    }

    #[test]
    fn test_workout_metadata() {
        let p = Processor::open(fixture()).expect("Failed to load export");
        let runs = p.runs();

        assert_eq!(runs[0].temperature, Some(75.0));
        assert_eq!(runs[0].humidity, Some(65.0));
        assert_eq!(runs[0].energy, Some(350.0));
        assert_eq!(runs[0].indoor, Some(false));

        assert_eq!(runs[1].temperature, None);
        assert_eq!(runs[1].energy, None);

        assert!((runs[2].temperature.unwrap() - 64.4).abs() < 1e-9);
        assert!((runs[2].energy.unwrap() - 500.0).abs() < 1e-9);
        assert_eq!(runs[2].humidity, None);

        assert_eq!(runs[3].indoor, Some(true));
    }

    #[test]
    fn test_reload_is_deterministic() {
        let mut p = Processor::open(fixture()).expect("Failed to load export");
        let heart_rates = p.heart_rates().to_vec();
        let runs = p.runs().to_vec();

        p.load().expect("Failed to reload export");
        assert_eq!(p.heart_rates(), heart_rates.as_slice());
        assert_eq!(p.runs(), runs.as_slice());

        let other = Processor::open(fixture()).expect("Failed to load export");
        assert_eq!(other.heart_rates(), heart_rates.as_slice());
        assert_eq!(other.runs(), runs.as_slice());
    }

    #[test]
    fn test_unknown_plot_field_is_a_configuration_error() {
        let p = Processor::open(fixture()).expect("Failed to load export");
        let heart_rates = p.heart_rates().to_vec();
        let runs = p.runs().to_vec();

        let tmp = tempfile::tempdir().expect("tempdir");
        let out = tmp.path().join("runs.svg");

        let err = p
            .run_plot("Pace", "Avg HR", "Cadence", &out)
            .expect_err("unknown field must be rejected");
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::UnknownField { ref name, .. }) if name == "Cadence"
        ));

        let err = p
            .run_plot("Date", "Avg HR", "Distance", &out)
            .expect_err("date is not numeric");
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::NonNumericField { .. })
        ));

        assert!(!out.exists());
        assert_eq!(p.heart_rates(), heart_rates.as_slice());
        assert_eq!(p.runs(), runs.as_slice());
    }

    #[test]
    fn test_hr_plot_selection_errors() {
        let p = Processor::open(fixture()).expect("Failed to load export");
        let tmp = tempfile::tempdir().expect("tempdir");
        let out = tmp.path().join("hr.svg");

        let err = p.hr_plot(date(2021, 8, 10), 0, &out).unwrap_err();
        assert!(matches!(err, Error::NoRunOn(d) if d == date(2021, 8, 10)));

        let err = p.hr_plot(date(2021, 8, 9), 2, &out).unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::RunIndex { idx: 2, count: 2, .. })
        ));
        assert_eq!(p.runs_on(date(2021, 8, 9)).len(), 2);
        assert!(!out.exists());
    }

    #[test]
    fn test_run_plot_renders_svg_and_png() {
        let p = Processor::open(fixture()).expect("Failed to load export");
        let tmp = tempfile::tempdir().expect("tempdir");

        for name in ["runs.svg", "runs.png"] {
            let out = tmp.path().join(name);
            p.run_plot("Pace", "Avg HR", "Distance", &out)
                .unwrap_or_else(|e| panic!("Failed to render {name}: {e}"));
            assert!(out.exists(), "{name} was not written");
            assert!(fs::metadata(&out).expect("stat chart").len() > 0);
        }

        let svg = fs::read_to_string(tmp.path().join("runs.svg")).expect("read svg");
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn test_hr_plot_renders_each_run_of_a_day() {
        let p = Processor::open(fixture()).expect("Failed to load export");
        let tmp = tempfile::tempdir().expect("tempdir");

        for idx in 0..2 {
            let out = tmp.path().join(format!("hr_{idx}.svg"));
            p.hr_plot(date(2021, 8, 9), idx, &out)
                .unwrap_or_else(|e| panic!("Failed to render run {idx}: {e}"));
            assert!(out.exists(), "run {idx} chart was not written");
        }
    }

    #[test]
    fn test_missing_file_is_a_parse_error() {
        let mut p = Processor::new("./no_such_dir/export.xml");
        let err = p.load().unwrap_err();
        assert!(matches!(err, Error::Parse(ParseError::Missing { .. })));
        assert!(p.runs().is_empty());
        assert!(p.heart_rates().is_empty());
    }

    #[test]
    fn test_malformed_export_is_a_parse_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("export.xml");
        let full = fs::read_to_string(fixture()).expect("read fixture");
        let cut = full.find("</Workout>").expect("fixture has workouts");
        fs::write(&path, format!("{}</HealthData>", &full[..cut])).expect("write truncated export");

        let err = Processor::open(&path).unwrap_err();
        assert!(matches!(err, Error::Parse(ParseError::Xml { .. })));
    }

    #[test]
    fn test_unclosed_root_is_a_parse_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("export.xml");
        let full = fs::read_to_string(fixture()).expect("read fixture");
        let cut = full.rfind("</HealthData>").expect("fixture closes its root");
        fs::write(&path, &full[..cut]).expect("write truncated export");

        let mut p = Processor::new(&path);
        let err = p.load().unwrap_err();
        assert!(matches!(err, Error::Parse(ParseError::Truncated("HealthData"))));
        assert!(p.runs().is_empty());
    }

    #[test]
    fn test_export_without_runs_is_a_parse_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("export.xml");
        fs::write(
            &path,
            r#"<HealthData locale="en_US">
 <Record type="HKQuantityTypeIdentifierHeartRate" unit="count/min" endDate="2021-08-09 18:56:00 -0400" value="140"/>
</HealthData>"#,
        )
        .expect("write export");

        let err = Processor::open(&path).unwrap_err();
        assert!(matches!(
            err,
            Error::Parse(ParseError::MissingRecordType("HKWorkoutActivityTypeRunning"))
        ));
    }
}
