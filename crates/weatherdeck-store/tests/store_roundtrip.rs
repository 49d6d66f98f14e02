//! Round-trip tests for the on-disk city store.

#![allow(clippy::unwrap_used)]

use weatherdeck_store::{City, CityStore};

#[tokio::test]
async fn test_cities_survive_reload_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cities.db");

    let added = vec![
        City::new("924938", "Kyiv, UA"),
        City::new("2459115", "New York, US"),
        City::new("44418", "London, GB"),
    ];

    {
        let store = CityStore::open(&path).await.unwrap();
        for city in &added {
            store.add(city).await.unwrap();
        }
    }

    let reopened = CityStore::open(&path).await.unwrap();
    let mut cursor = reopened.list();
    let mut loaded = Vec::new();
    while let Some(city) = cursor.next_city().await {
        loaded.push(city.unwrap());
    }
    assert_eq!(loaded, added);
}

#[tokio::test]
async fn test_duplicate_add_keeps_single_record_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cities.db");

    let store = CityStore::open(&path).await.unwrap();
    store.add(&City::new("924938", "Kyiv, UA")).await.unwrap();
    store.add(&City::new("924938", "Kyiv, UA")).await.unwrap();
    drop(store);

    let store = CityStore::open(&path).await.unwrap();
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_removed_city_stays_removed_after_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cities.db");

    {
        let store = CityStore::open(&path).await.unwrap();
        store.add(&City::new("924938", "Kyiv, UA")).await.unwrap();
        store.add(&City::new("44418", "London, GB")).await.unwrap();
        assert!(store.remove("924938").await.unwrap());
    }

    let store = CityStore::open(&path).await.unwrap();
    assert_eq!(
        store.all().await.unwrap(),
        vec![City::new("44418", "London, GB")]
    );
}
