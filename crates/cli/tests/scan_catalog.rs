//! End-to-end: save shares, scan, and read the catalog back.

use medley_core::scanner::{ScanOutcome, Scanner};
use medley_core::share::{ShareConfig, ShareKind};
use medley_core::{Catalog, MediaKind};
use sqlx::Row;

async fn catalog(name: &str) -> Catalog {
    let url = format!("sqlite://file:{name}?mode=memory&cache=shared");
    let pool = storage::connect(&url).await.unwrap();
    storage::migrate(&pool).await.unwrap();
    Catalog::new(pool)
}

fn local_share(name: &str, root: &std::path::Path) -> ShareConfig {
    ShareConfig::new(
        name,
        ShareKind::LocalFolder {
            root: root.to_string_lossy().into_owned(),
            bookmark: None,
        },
    )
}

#[tokio::test]
async fn share_round_trips_through_the_catalog() {
    let catalog = catalog("cli_shares").await;

    let mut share = ShareConfig::new(
        "nas",
        ShareKind::Ftp {
            host: "nas.local".to_string(),
            port: Some(2121),
            username: Some("alice".to_string()),
            password: Some("secret".to_string()),
            passive: Some(true),
        },
    );
    share.include_paths = vec!["/movies".to_string()];
    catalog.add_share(&share).await.unwrap();

    let shares = catalog.read_shares().await.unwrap();
    assert_eq!(shares, vec![share.clone()]);

    catalog.touch_share(&share.id, 1_700_000_000).await.unwrap();
    let touched = catalog.read_shares().await.unwrap();
    assert_eq!(touched[0].last_access, Some(1_700_000_000));

    assert!(catalog.remove_share(&share.id).await.unwrap());
    assert!(catalog.read_shares().await.unwrap().is_empty());
}

#[tokio::test]
async fn scanning_twice_keeps_one_row_and_bumps_last_seen() {
    let temp = tempfile::tempdir().unwrap();
    std::fs::write(temp.path().join("Alpha.2019.mkv"), b"abc").unwrap();
    std::fs::write(temp.path().join("cover.jpg"), b"abc").unwrap();

    let catalog = catalog("cli_rescan").await;
    catalog
        .add_share(&local_share("films", temp.path()))
        .await
        .unwrap();

    let scanner = Scanner::new(catalog.clone(), &[]).unwrap();
    let ScanOutcome::Completed(first) = scanner.scan_all_shares().await.unwrap() else {
        panic!("scan was skipped");
    };
    assert_eq!(first.indexed, 1);

    // Age the row, then rescan: same identity, newer sighting, original
    // discovery timestamp untouched.
    sqlx::query("UPDATE media_items SET last_seen_at = 100, discovered_at = 50")
        .execute(catalog.pool())
        .await
        .unwrap();
    scanner.scan_all_shares().await.unwrap();

    let rows = sqlx::query(
        "SELECT path, kind, title_guess, year_guess, discovered_at, last_seen_at FROM media_items",
    )
    .fetch_all(catalog.pool())
    .await
    .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get::<String, _>("path"), "/Alpha.2019.mkv");
    assert_eq!(rows[0].get::<String, _>("kind"), MediaKind::Movie.as_str());
    assert_eq!(rows[0].get::<String, _>("title_guess"), "Alpha 2019");
    assert_eq!(rows[0].get::<i64, _>("year_guess"), 2019);
    assert_eq!(rows[0].get::<i64, _>("discovered_at"), 50);
    assert!(rows[0].get::<i64, _>("last_seen_at") > 100);
}

#[tokio::test]
async fn removing_a_share_drops_its_media() {
    let temp = tempfile::tempdir().unwrap();
    std::fs::write(temp.path().join("Pilot.S01E01.mkv"), b"abc").unwrap();

    let catalog = catalog("cli_remove").await;
    let share = local_share("tv", temp.path());
    catalog.add_share(&share).await.unwrap();

    let scanner = Scanner::new(catalog.clone(), &[]).unwrap();
    scanner.scan_all_shares().await.unwrap();
    assert_eq!(catalog.media_count().await.unwrap(), 1);

    catalog.remove_share(&share.id).await.unwrap();
    assert_eq!(catalog.media_count().await.unwrap(), 0);
}

#[tokio::test]
async fn include_paths_limit_the_walk() {
    let temp = tempfile::tempdir().unwrap();
    std::fs::create_dir(temp.path().join("keep")).unwrap();
    std::fs::create_dir(temp.path().join("skip")).unwrap();
    std::fs::write(temp.path().join("keep").join("In.mkv"), b"x").unwrap();
    std::fs::write(temp.path().join("skip").join("Out.mkv"), b"x").unwrap();

    let catalog = catalog("cli_include").await;
    let mut share = local_share("partial", temp.path());
    share.include_paths = vec!["/keep".to_string()];
    catalog.add_share(&share).await.unwrap();

    let scanner = Scanner::new(catalog.clone(), &[]).unwrap();
    scanner.scan_all_shares().await.unwrap();

    let media = catalog.media_for_share(&share.id).await.unwrap();
    assert_eq!(media.len(), 1);
    assert_eq!(media[0].path, "/keep/In.mkv");
}
