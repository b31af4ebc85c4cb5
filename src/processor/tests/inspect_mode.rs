//! Inspect-only mode tests

use crate::config::ProcessorConfig;
use crate::matfile::MatValue;
use crate::models::FileStatus;
use crate::parser::SkipReason;
use crate::processor::BatchProcessor;
use crate::test_support::{
    battery_record, charge_data, cycle, discharge_data, impedance_data, write_mat_file,
};
use tempfile::TempDir;

#[tokio::test]
async fn test_inspect_only_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    write_mat_file(
        temp_dir.path(),
        "B0005.mat",
        &[(
            "B0005",
            battery_record(vec![
                cycle("charge", 24.0, charge_data(3)),
                cycle("impedance", 24.0, impedance_data()),
                cycle("discharge", 24.0, discharge_data(2, Some(MatValue::scalar(1.9)))),
            ]),
        )],
    );
    let output_path = temp_dir.path().join("out");

    let stats = BatchProcessor::new(temp_dir.path().to_path_buf(), Some(output_path.clone()))
        .unwrap()
        .with_config(ProcessorConfig::default().with_inspect_only())
        .process()
        .await
        .unwrap();

    assert!(!output_path.exists());
    assert_eq!(stats.total_rows, 5);
    assert_eq!(stats.cycles_skipped, 1);

    match &stats.files[0].status {
        FileStatus::Parsed {
            battery_id,
            report,
            output,
        } => {
            assert_eq!(battery_id, "B0005");
            assert!(output.is_none());
            assert_eq!(report.skipped[0].cycle_number, 2);
            assert_eq!(report.skipped[0].reason, SkipReason::Impedance);
        }
        other => panic!("Expected parsed file, got {:?}", other),
    }
}
