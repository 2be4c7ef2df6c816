//! End-to-end tests across the storage and index layers.

use anyhow::Result;
use minibase::access::{CompOp, FieldType, IndexKey, IndexManager, Rid};
use minibase::storage::{PageNum, PagedFileManager, StorageError, StoreConfig};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tempfile::tempdir;

const PAGE: usize = 128;

fn small_store(dir: &std::path::Path, buffer_capacity: usize) -> PagedFileManager {
    PagedFileManager::new(
        dir,
        StoreConfig {
            page_size: PAGE,
            buffer_capacity,
        },
    )
}

#[test]
fn appended_pages_hit_disk_byte_for_byte() -> Result<()> {
    let dir = tempdir()?;
    let mut pfm = small_store(dir.path(), 2);
    pfm.create_file("table.data")?;
    let fid = pfm.open_file("table.data")?;

    let mut expected = Vec::new();
    for i in 0..7u8 {
        let page: Vec<u8> = (0..PAGE).map(|j| i.wrapping_mul(31).wrapping_add(j as u8)).collect();
        pfm.append_page(fid, Some(&page))?;
        expected.extend_from_slice(&page);
    }
    pfm.close_file(fid)?;

    let on_disk = std::fs::read(dir.path().join("table.data"))?;
    assert_eq!(on_disk, expected);
    Ok(())
}

#[test]
fn out_of_range_read_propagates_a_page_error() -> Result<()> {
    let dir = tempdir()?;
    let mut pfm = small_store(dir.path(), 4);
    pfm.create_file("t")?;
    let fid = pfm.open_file("t")?;
    pfm.append_page(fid, None)?;

    assert!(matches!(
        pfm.read_page(fid, PageNum(1)),
        Err(StorageError::ReadPage { .. })
    ));
    // The store keeps working afterwards.
    assert_eq!(pfm.read_page(fid, PageNum(0))?.len(), PAGE);
    Ok(())
}

#[test]
fn index_scan_is_sorted_for_any_insertion_order() -> Result<()> {
    let dir = tempdir()?;
    let mut mgr = IndexManager::new(small_store(dir.path(), 8));
    mgr.create_index("emp", 0, FieldType::Int, 4)?;
    let handle = mgr.open_index("emp", 0)?;

    let mut rng = rand::rngs::StdRng::seed_from_u64(123);
    let mut keys: Vec<i32> = (0..200).collect();
    for round in 0..3 {
        keys.shuffle(&mut rng);
        for &k in &keys {
            mgr.insert_entry(&handle, &IndexKey::Int(k), Rid::new(k, round))?;
        }
    }

    let rids: Vec<Rid> = mgr.scan(&handle, None)?.collect::<Result<_, _>>()?;
    assert_eq!(rids.len(), 600);
    // Non-decreasing key order: the key is recoverable from rid.page_num here.
    for pair in rids.windows(2) {
        assert!(pair[0].page_num <= pair[1].page_num);
    }
    Ok(())
}

#[test]
fn duplicate_rids_survive_reopen() -> Result<()> {
    let dir = tempdir()?;
    let mut mgr = IndexManager::new(small_store(dir.path(), 8));
    mgr.create_index("emp", 0, FieldType::Int, 4)?;
    let handle = mgr.open_index("emp", 0)?;

    // Far more duplicates than one bucket page holds.
    let n: i32 = 40;
    for slot in 0..n {
        mgr.insert_entry(&handle, &IndexKey::Int(7), Rid::new(3, slot))?;
    }
    for slot in 0..n / 2 {
        mgr.remove_entry(&handle, &IndexKey::Int(7), Rid::new(3, slot))?;
    }
    mgr.close_index(handle)?;

    let handle = mgr.open_index("emp", 0)?;
    let mut rids: Vec<Rid> = mgr
        .scan(&handle, Some((CompOp::Equal, IndexKey::Int(7))))?
        .collect::<Result<_, _>>()?;
    rids.sort();
    assert_eq!(rids, (n / 2..n).map(|s| Rid::new(3, s)).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn range_filters_agree_with_a_full_scan() -> Result<()> {
    let dir = tempdir()?;
    let mut mgr = IndexManager::new(small_store(dir.path(), 8));
    mgr.create_index("emp", 0, FieldType::Int, 4)?;
    let handle = mgr.open_index("emp", 0)?;

    for k in (0..100).rev() {
        mgr.insert_entry(&handle, &IndexKey::Int(k), Rid::new(k, 0))?;
    }

    let keys = |rids: Vec<Rid>| rids.into_iter().map(|r| r.page_num).collect::<Vec<i32>>();
    let bound = IndexKey::Int(42);
    let cases: Vec<(CompOp, Vec<i32>)> = vec![
        (CompOp::Less, (0..42).collect()),
        (CompOp::LessEq, (0..43).collect()),
        (CompOp::Greater, (43..100).collect()),
        (CompOp::GreaterEq, (42..100).collect()),
        (CompOp::Equal, vec![42]),
        (CompOp::NotEqual, (0..100).filter(|&k| k != 42).collect()),
    ];
    for (op, expected) in cases {
        let rids: Vec<Rid> = mgr
            .scan(&handle, Some((op, bound.clone())))?
            .collect::<Result<_, _>>()?;
        assert_eq!(keys(rids), expected, "filter {:?}", op);
    }
    Ok(())
}

#[test]
fn index_and_data_files_share_one_buffer_pool() -> Result<()> {
    let dir = tempdir()?;
    // A pool this small forces constant eviction while the tree splits.
    let mut mgr = IndexManager::new(small_store(dir.path(), 3));
    mgr.create_index("emp", 0, FieldType::Int, 4)?;
    let handle = mgr.open_index("emp", 0)?;

    mgr.storage().create_file("emp.data")?;
    let data_file = mgr.storage().open_file("emp.data")?;

    for k in 0..150 {
        let page = vec![k as u8; PAGE];
        mgr.storage().append_page(data_file, Some(&page))?;
        mgr.insert_entry(&handle, &IndexKey::Int(k), Rid::new(k, 0))?;
    }

    let rids: Vec<Rid> = mgr.scan(&handle, None)?.collect::<Result<_, _>>()?;
    assert_eq!(rids.len(), 150);
    for (k, rid) in rids.iter().enumerate() {
        assert_eq!(rid.page_num, k as i32);
        let page = mgr.storage().read_page(data_file, PageNum(k as u32))?;
        assert_eq!(page[0], k as u8);
    }
    Ok(())
}
