// ==========================================
// 并发导入测试
// ==========================================
// 测试目标: 两个会话同时导入有重叠的批次，最终记录数等于去重身份数
// ==========================================

mod test_helpers;

use harvest_ingest::config::IngestConfig;
use harvest_ingest::importer::{HarvestImporter, HarvestImporterImpl};
use harvest_ingest::logging;
use harvest_ingest::repository::{HarvestStore, SqliteHarvestStore};
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Instant;
use test_helpers::{standard_csv, today};

/// 生成 [start, end) 天的批次（每天 2 个作物）
fn batch_rows(start: u32, end: u32) -> String {
    let rows: Vec<String> = (start..end)
        .flat_map(|day| {
            vec![
                format!("2025/07/{:02},A農園,トマト,{}", day, 1000 + day),
                format!("2025/07/{:02},B農園,ナス,{}", day, 500 + day),
            ]
        })
        .collect();
    let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
    standard_csv(&refs)
}

#[test]
fn test_concurrent_overlapping_imports() {
    logging::init_test();
    let (_temp_file, db_path) = test_helpers::create_test_db().expect("Failed to create test db");
    // 先切换到 WAL（持久化在库文件中）
    let store = SqliteHarvestStore::new(&db_path).expect("Failed to create store");

    // 第 11 ~ 20 天重叠
    let batches = vec![batch_rows(1, 21), batch_rows(11, 31)];
    let expected: HashSet<String> = batches
        .iter()
        .flat_map(|b| b.lines().skip(1).map(str::to_string).collect::<Vec<_>>())
        .collect();

    let barrier = Arc::new(Barrier::new(batches.len()));
    let start = Instant::now();

    let handles: Vec<_> = batches
        .into_iter()
        .enumerate()
        .map(|(idx, body)| {
            let db_path = db_path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                // 每个会话独立连接
                let store = SqliteHarvestStore::new(&db_path).expect("Failed to create store");
                let importer = HarvestImporterImpl::new(store, IngestConfig::default());
                let name = format!("session_{}.csv", idx);
                barrier.wait();
                importer
                    .ingest(body.as_bytes(), Some(&name), today())
                    .expect("并发导入应该成功")
            })
        })
        .collect();

    let reports: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("线程不应 panic"))
        .collect();
    println!("并发导入耗时: {:?}", start.elapsed());

    let count = store.count().unwrap();
    assert_eq!(count, expected.len());
    assert_eq!(count, 60);

    let inserted: usize = reports.iter().map(|r| r.outcome.inserted).sum();
    let skipped: usize = reports.iter().map(|r| r.outcome.skipped_as_duplicate).sum();
    assert_eq!(inserted, 60);
    assert_eq!(skipped, 20);
    for report in &reports {
        assert!(report.outcome.is_balanced());
    }
}
