//! Retry behavior of the fetcher, timed on a paused clock.

mod common;

use std::sync::Arc;
use std::time::Duration;

use acquisition::{
    compute_window, AcquisitionError, Catalog, DatasetFamily, Fetcher, ModelCycle, RetryPolicy,
};
use common::{date, FakeCatalog, FakeDataset, BASE_URL};
use tokio::time::Instant;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

fn setup() -> (Arc<FakeCatalog>, acquisition::DatasetReference) {
    let fake = FakeCatalog::new();
    let reference = Catalog::new(BASE_URL).reference(DatasetFamily::Fnl, date(2022, 5, 26), ModelCycle::Z00);
    fake.insert(
        reference.url.clone(),
        FakeDataset::analysis(10.0, 0, 738_303.0, &["tmp2m"]),
    );
    (fake, reference)
}

#[tokio::test(start_paused = true)]
async fn test_exhaustion_after_ten_attempts_and_three_delays() {
    let (fake, reference) = setup();
    fake.fail_always(&reference.url, "lon");
    let fetcher = Fetcher::new(fake.clone(), RetryPolicy::default(), CancellationToken::new());

    let started = Instant::now();
    let err = fetcher.fetch_vector(&reference, "lon").await.unwrap_err();

    match err {
        AcquisitionError::FetchFailed {
            variable, attempts, ..
        } => {
            assert_eq!(variable, "lon");
            assert_eq!(attempts, 10);
        }
        other => panic!("expected FetchFailed, got {:?}", other),
    }
    assert_eq!(fake.read_count("lon"), 10);
    // 10 s before each of attempts 8, 9 and 10, nothing after the last
    assert_eq!(started.elapsed(), Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_recover_without_delay() {
    let (fake, reference) = setup();
    fake.fail_reads(&reference.url, "lat", 3);
    let fetcher = Fetcher::new(fake.clone(), RetryPolicy::default(), CancellationToken::new());

    let started = Instant::now();
    let lat = assert_ok!(fetcher.fetch_vector(&reference, "lat").await);

    assert_eq!(lat.values.len(), 19);
    assert_eq!(fake.read_count("lat"), 4);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_recovery_on_last_attempt() {
    let (fake, reference) = setup();
    fake.fail_reads(&reference.url, "lat", 9);
    let fetcher = Fetcher::new(fake.clone(), RetryPolicy::default(), CancellationToken::new());

    let started = Instant::now();
    assert_ok!(fetcher.fetch_vector(&reference, "lat").await);
    assert_eq!(fake.read_count("lat"), 10);
    assert_eq!(started.elapsed(), Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_missing_variable_is_not_retried() {
    let (fake, reference) = setup();
    let fetcher = Fetcher::new(fake.clone(), RetryPolicy::default(), CancellationToken::new());
    let window = compute_window(
        &test_utils::global_lon_axis(10.0),
        &test_utils::global_lat_axis(10.0),
        &test_utils::region::EASTERN.into(),
        0.0,
    )
    .unwrap();

    let started = Instant::now();
    let err = fetcher
        .fetch_slice(&reference, "vgrd10m", 0..1, &window)
        .await
        .unwrap_err();

    assert!(matches!(err, AcquisitionError::VariableNotFound { ref variable, .. } if variable == "vgrd10m"));
    assert_eq!(fake.read_count("vgrd10m"), 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_short_slab_is_retried_to_exhaustion() {
    let (fake, reference) = setup();
    fake.short_reads(&reference.url, "tmp2m");
    let fetcher = Fetcher::new(fake.clone(), RetryPolicy::default(), CancellationToken::new());
    let window = compute_window(
        &test_utils::global_lon_axis(10.0),
        &test_utils::global_lat_axis(10.0),
        &test_utils::region::EASTERN.into(),
        0.0,
    )
    .unwrap();

    let started = Instant::now();
    let err = fetcher
        .fetch_slice(&reference, "tmp2m", 0..1, &window)
        .await
        .unwrap_err();

    match err {
        AcquisitionError::FetchFailed {
            attempts, last_error, ..
        } => {
            assert_eq!(attempts, 10);
            assert!(last_error.contains("values for a 1x"), "{}", last_error);
        }
        other => panic!("expected FetchFailed, got {:?}", other),
    }
    assert_eq!(fake.read_count("tmp2m"), 10);
    assert_eq!(started.elapsed(), Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_interrupts_backoff() {
    let (fake, reference) = setup();
    fake.fail_always(&reference.url, "tmp2m");
    let cancel = CancellationToken::new();
    let fetcher = Fetcher::new(fake.clone(), RetryPolicy::default(), cancel.clone());
    let window = compute_window(
        &test_utils::global_lon_axis(10.0),
        &test_utils::global_lat_axis(10.0),
        &test_utils::region::SEAM.into(),
        0.0,
    )
    .unwrap();

    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(15)).await;
            cancel.cancel();
        })
    };

    let started = Instant::now();
    let err = fetcher
        .fetch_slice(&reference, "tmp2m", 0..1, &window)
        .await
        .unwrap_err();
    canceller.await.unwrap();

    assert!(matches!(err, AcquisitionError::Cancelled));
    // Attempts 1-8 ran; cancelled during the wait before attempt 9
    assert_eq!(fake.read_count("tmp2m"), 8);
    assert_eq!(started.elapsed(), Duration::from_secs(15));
}

#[tokio::test(start_paused = true)]
async fn test_seam_window_is_stitched_in_order() {
    let (fake, reference) = setup();
    let fetcher = Fetcher::new(fake.clone(), RetryPolicy::default(), CancellationToken::new());
    let lon = test_utils::global_lon_axis(10.0);
    let lat = test_utils::global_lat_axis(10.0);
    let window = compute_window(&lon, &lat, &test_utils::region::SEAM.into(), 10.0).unwrap();

    // -10, 0, 10 degrees => native columns 35, 0, 1
    assert_eq!(window.lon(), &[-10.0, 0.0, 10.0]);
    let data = fetcher
        .fetch_slice(&reference, "tmp2m", 0..1, &window)
        .await
        .unwrap();

    let j0 = window.lat_range().start;
    assert_eq!(data.len(), window.nlat() * 3);
    assert_eq!(data[0], test_utils::test_field_value(0, j0, 35));
    assert_eq!(data[1], test_utils::test_field_value(0, j0, 0));
    assert_eq!(data[2], test_utils::test_field_value(0, j0, 1));
    assert_eq!(data[3], test_utils::test_field_value(0, j0 + 1, 35));
}
