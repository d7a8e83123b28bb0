use bondstore::ble::{bond_type, IRQ_BOND_READ, IRQ_BOND_WRITE, IRQ_SET_SECRET, IRQ_GET_SECRET};
use bondstore::{
    Address, BondKind, BondQuery, BondRecord, CccdRecord, EventBridge, Field, FileStorage,
    KeyStore, SecretBridge, SecurityRecord, Storage,
};
use rand::Rng;

fn random_key(rng: &mut impl Rng) -> Option<Vec<u8>> {
    if rng.gen_bool(0.3) {
        return None;
    }
    let mut key = vec![0u8; 16];
    rng.fill_bytes(&mut key);
    Some(key)
}

fn random_security(rng: &mut impl Rng) -> SecurityRecord {
    SecurityRecord {
        address_type: rng.gen_range(0..2),
        address: Address(rng.r#gen()),
        key_size: rng.gen_range(7..=16),
        ediv: rng.gen_bool(0.5).then(|| rng.r#gen()),
        rand: rng.gen_bool(0.5).then(|| rng.r#gen()),
        long_term_key: random_key(rng),
        identity_resolving_key: random_key(rng),
        signing_key: random_key(rng),
        authenticated: rng.r#gen(),
        secure_connection: rng.r#gen(),
    }
}

#[test]
fn random_stores_survive_the_file_medium() {
    let dir = tempfile::tempdir().unwrap();
    let mut rng = rand::thread_rng();

    for round in 0..20 {
        let mut ks = KeyStore::new();
        for _ in 0..rng.gen_range(0..5) {
            ks.add(BondRecord::OwnSecurity(random_security(&mut rng)));
        }
        for _ in 0..rng.gen_range(0..5) {
            ks.add(BondRecord::PeerSecurity(random_security(&mut rng)));
        }
        for _ in 0..rng.gen_range(0..5) {
            ks.add(BondRecord::Cccd(CccdRecord {
                address_type: rng.gen_range(0..2),
                address: Address(rng.r#gen()),
                characteristic_value_handle: rng.r#gen(),
                flags: rng.r#gen(),
                value_changed: rng.r#gen(),
            }));
        }

        let mut storage = FileStorage::new(dir.path().join(format!("bonds-{round}.json")));
        bondstore::save(&ks, &mut storage).unwrap();
        let loaded: KeyStore = bondstore::load(&storage);
        assert_eq!(loaded, ks, "round {round}");
    }
}

#[test]
fn bonds_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bonds.json");
    let peer: [u8; 6] = [0x00, 0xFF, 0xCD, 0x9E, 0x36, 0x4E];

    let mut bridge = EventBridge::open(FileStorage::new(&path), 8);
    let write: Vec<Field> = vec![
        bond_type::PEER_SEC.into(),
        1u8.into(),
        peer.into(),
        16u8.into(),
        Field::None,
        Field::None,
        vec![0u8; 16].into(),
        Field::None,
        Field::None,
        true.into(),
        true.into(),
    ];
    bridge.handle(IRQ_BOND_WRITE, &write).unwrap();
    assert!(!path.exists());
    assert_eq!(bridge.run_pending().unwrap(), 1);

    // device reboots
    let mut bridge = EventBridge::open(FileStorage::new(&path), 8);
    let read: Vec<Field> = vec![bond_type::PEER_SEC.into(), 1u8.into(), peer.into()];
    let reply = bridge.handle(IRQ_BOND_READ, &read).unwrap().unwrap();
    assert_eq!(reply.len(), 10);
    assert_eq!(reply[1], Field::Bytes(peer.to_vec()));
    assert_eq!(reply[5], Field::Bytes(vec![0u8; 16]));

    let query = BondQuery::address(1, Address(peer));
    assert!(bridge.delete(BondKind::PeerSecurity, &query).is_some());
    bridge.run_pending().unwrap();
    assert!(EventBridge::open(FileStorage::new(&path), 8).store().is_empty());
}

#[test]
fn corrupt_file_starts_empty_and_is_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bonds.json");
    std::fs::write(&path, "{\"KEYSTORE_OUR_SEC\": [").unwrap();

    let mut bridge = EventBridge::open(FileStorage::new(&path), 8);
    assert!(bridge.store().is_empty());

    bridge.clear();
    bridge.run_pending().unwrap();
    let data = FileStorage::new(&path).read().unwrap().unwrap();
    let doc: serde_json::Value = serde_json::from_slice(&data).unwrap();
    assert_eq!(doc["KEYSTORE_CCCD"], serde_json::json!([]));
}

#[test]
fn secrets_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("secrets.json");

    let mut bridge = SecretBridge::open(FileStorage::new(&path), 8);
    let set: Vec<Field> = vec![3u8.into(), b"peer".to_vec().into(), b"blob".to_vec().into()];
    assert_eq!(bridge.handle(IRQ_SET_SECRET, &set).unwrap(), Some(Field::Bool(true)));
    bridge.run_pending().unwrap();

    let mut bridge = SecretBridge::open(FileStorage::new(&path), 8);
    let get: Vec<Field> = vec![3u8.into(), 0usize.into(), Field::None];
    assert_eq!(bridge.handle(IRQ_GET_SECRET, &get).unwrap(), Some(Field::Bytes(b"blob".to_vec())));
}

#[test]
fn failed_file_save_keeps_previous_bonds() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bonds.json");
    let mut storage = FileStorage::new(&path);

    let mut ks = KeyStore::new();
    ks.add(BondRecord::OwnSecurity(random_security(&mut rand::thread_rng())));
    bondstore::save(&ks, &mut storage).unwrap();

    std::fs::create_dir(dir.path().join("bonds.json.tmp")).unwrap();
    assert!(bondstore::save(&KeyStore::new(), &mut storage).is_err());

    let loaded: KeyStore = bondstore::load(&FileStorage::new(&path));
    assert_eq!(loaded, ks);
    assert!(!dir.path().join("bonds.json.tmp").is_file());
}
