//! End-to-end runs against an in-memory bucket.

use async_trait::async_trait;
use chrono::NaiveDate;
use klinevault_lib::prelude::*;
use klinevault_lib::{ListPage, ObjectEntry, TransferItem, TransferResult, compute_sha256};
use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use zip::write::SimpleFileOptions;

const BASE_URL: &str = "mem://vault/";
const ROOT: &str = "data/spot/daily/klines/";

/// Bucket contents keyed by object key.
#[derive(Debug, Default)]
struct Bucket {
    objects: BTreeMap<String, Vec<u8>>,
    broken_prefixes: HashSet<String>,
}

impl Bucket {
    fn with_days(symbols: &[&str], days: &[u32]) -> Self {
        let mut bucket = Self::default();
        for symbol in symbols {
            for (i, day) in days.iter().enumerate() {
                bucket.add_day(symbol, *day, i % 2 == 0);
            }
        }
        bucket
    }

    fn key(symbol: &str, day: u32) -> String {
        format!("{ROOT}{symbol}/1m/{symbol}-1m-2023-01-{day:02}.zip")
    }

    fn add_day(&mut self, symbol: &str, day: u32, header: bool) {
        let key = Self::key(symbol, day);
        let name = key.rsplit('/').next().unwrap().to_string();
        let archive = kline_archive(&name.replace(".zip", ".csv"), day, header);
        let sidecar = format!("{}  {name}\n", compute_sha256(&archive));
        self.objects.insert(format!("{key}.CHECKSUM"), sidecar.into_bytes());
        self.objects.insert(key, archive);
    }

    fn corrupt(&mut self, symbol: &str, day: u32) {
        if let Some(archive) = self.objects.get_mut(&Self::key(symbol, day)) {
            let last = archive.len() - 1;
            archive[last] ^= 0xff;
        }
    }
}

fn kline_archive(entry: &str, day: u32, header: bool) -> Vec<u8> {
    let start = NaiveDate::from_ymd_opt(2023, 1, day)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
        .timestamp_millis();
    let mut csv = String::new();
    if header {
        csv.push_str("open_time,open,high,low,close,volume,close_time,quote_volume,count,taker_buy_volume,taker_buy_quote_volume,ignore\n");
    }
    for minute in 0..5i64 {
        let open = start + minute * 60_000;
        csv.push_str(&format!(
            "{open},16541.77,16545.70,16508.39,16529.67,182.5,{},3016889.86,{},91.1,1505880.05,0\n",
            open + 59_999,
            100 + minute
        ));
    }

    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    writer
        .start_file(entry, SimpleFileOptions::default())
        .unwrap();
    writer.write_all(csv.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

struct MemStore(Arc<Bucket>);

#[async_trait]
impl RemoteStore for MemStore {
    async fn list_page(&self, prefix: &str, _marker: Option<&str>) -> Result<ListPage> {
        if self.0.broken_prefixes.contains(prefix) {
            return Err(KlineVaultError::RemoteUnavailable(format!("{prefix} refused")));
        }
        let mut page = ListPage::default();
        for key in self.0.objects.keys() {
            let Some(rest) = key.strip_prefix(prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((dir, _)) => {
                    let dir = format!("{prefix}{dir}/");
                    if !page.directories.contains(&dir) {
                        page.directories.push(dir);
                    }
                }
                None => page.objects.push(ObjectEntry {
                    key: key.clone(),
                    size: 1,
                    last_modified: None,
                }),
            }
        }
        Ok(page)
    }

    fn object_url(&self, key: &str) -> String {
        format!("{BASE_URL}{key}")
    }
}

struct MemTransfer {
    bucket: Arc<Bucket>,
    calls: AtomicUsize,
}

#[async_trait]
impl Transfer for MemTransfer {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn transfer(&self, items: &[TransferItem]) -> Vec<TransferResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        items
            .iter()
            .map(|item| -> TransferResult {
                let key = item.url.trim_start_matches(BASE_URL);
                let data = self
                    .bucket
                    .objects
                    .get(key)
                    .ok_or_else(|| format!("404 {key}"))?;
                let parent = item.destination.parent().unwrap();
                std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
                std::fs::write(&item.destination, data).map_err(|e| e.to_string())
            })
            .collect()
    }
}

struct Harness {
    pipeline: Pipeline,
    transfer: Arc<MemTransfer>,
    _dir: tempfile::TempDir,
}

fn harness(bucket: Bucket, policy: MismatchPolicy) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let bucket = Arc::new(bucket);
    let transfer = Arc::new(MemTransfer {
        bucket: bucket.clone(),
        calls: AtomicUsize::new(0),
    });
    let config = PipelineConfig {
        data_root: dir.path().to_path_buf(),
        base_url: BASE_URL.to_string(),
        mismatch_policy: policy,
        ..PipelineConfig::default()
    };
    let builder = PathBuilder::new(
        MarketSegment::Spot,
        DataKind::Klines,
        Frequency::Daily,
        Some(KlineInterval::Minute1),
    )
    .unwrap();
    let pipeline =
        Pipeline::new(config, builder, Arc::new(MemStore(bucket)), transfer.clone()).unwrap();
    Harness {
        pipeline,
        transfer,
        _dir: dir,
    }
}

fn january(first: u32, last: u32) -> DateRange {
    DateRange::new(
        NaiveDate::from_ymd_opt(2023, 1, first).unwrap(),
        NaiveDate::from_ymd_opt(2023, 1, last).unwrap(),
    )
    .unwrap()
}

#[tokio::test]
async fn sync_verifies_and_parses_every_archive() {
    let h = harness(
        Bucket::with_days(&["BTCUSDT", "ETHUSDT"], &[1, 2]),
        MismatchPolicy::Flag,
    );
    let range = january(1, 2);

    let report = h.pipeline.sync(&[], Some(&range), None).await.unwrap();
    assert_eq!(
        report.symbols,
        vec![Symbol::from("BTCUSDT"), Symbol::from("ETHUSDT")]
    );
    assert_eq!(report.listing.total_files(), 4);
    assert_eq!(report.download.succeeded(), 4);
    assert_eq!(report.verified(), 4);
    assert!(report.errors().is_empty());

    let parsed = h.pipeline.parse(&report.symbols, Some(&range)).await.unwrap();
    assert_eq!(parsed.tables.len(), 4);
    assert_eq!(parsed.failed(), 0);
    for (path, table) in &parsed.tables {
        let rows = table.as_ref().unwrap().as_klines().unwrap();
        assert_eq!(rows.len(), 5, "{}", path.display());
        assert!(rows.windows(2).all(|w| w[0].open_time < w[1].open_time));
    }
}

#[tokio::test]
async fn second_sync_makes_no_transfer_attempts() {
    let h = harness(
        Bucket::with_days(&["BTCUSDT", "ETHUSDT"], &[1, 2]),
        MismatchPolicy::Flag,
    );
    let range = january(1, 2);

    h.pipeline.sync(&[], Some(&range), None).await.unwrap();
    let calls = h.transfer.calls.load(Ordering::SeqCst);
    assert!(calls > 0);

    let again = h.pipeline.sync(&[], Some(&range), None).await.unwrap();
    assert_eq!(again.complete.len(), 2);
    assert_eq!(again.download.transfer_attempts, 0);
    assert_eq!(h.transfer.calls.load(Ordering::SeqCst), calls);

    // Without a range nothing is skipped up front, but every file is present.
    let unbounded = h.pipeline.sync(&[], None, None).await.unwrap();
    assert_eq!(unbounded.download.skipped(), 4);
    assert_eq!(unbounded.download.transfer_attempts, 0);
    assert!(unbounded.verification.is_empty());
}

#[tokio::test]
async fn corrupted_archive_is_deleted_and_reported_missing() {
    let mut bucket = Bucket::with_days(&["BTCUSDT"], &[1, 2]);
    bucket.corrupt("BTCUSDT", 2);
    let h = harness(bucket, MismatchPolicy::Delete);
    let range = january(1, 2);
    let btc = [Symbol::from("BTCUSDT")];

    let report = h.pipeline.sync(&btc, Some(&range), None).await.unwrap();
    assert_eq!(report.verified(), 1);
    let mismatched: Vec<_> = report
        .verification
        .iter()
        .filter(|r| matches!(r.outcome, VerificationOutcome::Mismatched { .. }))
        .collect();
    assert_eq!(mismatched.len(), 1);
    assert!(mismatched[0].deleted);
    assert!(!mismatched[0].file.path().exists());
    assert_eq!(report.errors().len(), 1);

    let status = h.pipeline.status(&btc, Some(&range)).await.unwrap();
    assert_eq!(status.len(), 1);
    assert_eq!(status[0].verified, 1);
    assert_eq!(status[0].mismatched, 0);
    assert_eq!(status[0].missing, Some(1));
}

#[tokio::test]
async fn flagged_mismatch_stays_on_disk() {
    let mut bucket = Bucket::with_days(&["BTCUSDT"], &[1]);
    bucket.corrupt("BTCUSDT", 1);
    let h = harness(bucket, MismatchPolicy::Flag);

    let report = h.pipeline.sync(&[], None, None).await.unwrap();
    assert_eq!(report.verified(), 0);
    assert!(!report.verification[0].deleted);
    assert!(report.verification[0].file.path().exists());

    let status = h.pipeline.status(&[], None).await.unwrap();
    assert_eq!(status[0].symbol, Symbol::from("BTCUSDT"));
    assert_eq!(status[0].mismatched, 1);

    let parsed = h.pipeline.parse(&[Symbol::from("BTCUSDT")], None).await.unwrap();
    assert!(parsed.tables.is_empty());
}

#[tokio::test]
async fn failed_symbol_listing_is_isolated() {
    let mut bucket = Bucket::with_days(&["BTCUSDT", "ETHUSDT"], &[1]);
    bucket
        .broken_prefixes
        .insert(format!("{ROOT}ETHUSDT/1m/"));
    let h = harness(bucket, MismatchPolicy::Flag);

    let report = h.pipeline.sync(&[], None, None).await.unwrap();
    assert_eq!(report.verified(), 1);
    assert!(report.listing.errors.contains_key(&Symbol::from("ETHUSDT")));
    assert!(report.listing.files[&Symbol::from("ETHUSDT")].is_empty());
    assert_eq!(report.errors().len(), 1);
}

#[tokio::test]
async fn export_writes_one_file_per_archive() {
    let h = harness(Bucket::with_days(&["BTCUSDT"], &[1, 2]), MismatchPolicy::Flag);

    let report = h
        .pipeline
        .sync(&[], None, Some(OutputFormat::Csv))
        .await
        .unwrap();
    assert_eq!(report.exports.len(), 2);
    for outcome in &report.exports {
        let output = outcome.result.as_ref().unwrap();
        assert!(output.starts_with(h.pipeline.config().parsed_root()));
        assert_eq!(output.extension().and_then(|e| e.to_str()), Some("csv"));
        let content = std::fs::read_to_string(output).unwrap();
        assert_eq!(content.lines().count(), 6);
    }

    let parquet = h
        .pipeline
        .export(&[Symbol::from("BTCUSDT")], None, OutputFormat::Parquet)
        .await
        .unwrap();
    assert!(parquet.iter().all(|o| o.result.is_ok()));
    let first = parquet[0].result.as_ref().unwrap();
    assert_eq!(&std::fs::read(first).unwrap()[0..4], b"PAR1");
    assert!(!Path::new(&format!("{}.part", first.display())).exists());
}
