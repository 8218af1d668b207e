use access_plane::AccessMask;
use gate::{default_table, OperationClass};

#[test]
fn data_operations_resolve_to_service_and_mask() {
    let table = default_table();
    match table.resolve("eventlog.query") {
        Some(OperationClass::Data { service_id, access }) => {
            assert_eq!(service_id, "eventlog");
            assert_eq!(access, AccessMask::READ);
        }
        other => panic!("unexpected class: {other:?}"),
    }
    match table.resolve("filesearch.reindex") {
        Some(OperationClass::Data { service_id, access }) => {
            assert_eq!(service_id, "filesearch");
            assert_eq!(access, AccessMask::WRITE);
        }
        other => panic!("unexpected class: {other:?}"),
    }
}

#[test]
fn administrative_operations_are_classified_explicitly() {
    let table = default_table();
    assert!(matches!(
        table.resolve("admin.service.enable"),
        Some(OperationClass::Admin)
    ));
    assert!(matches!(
        table.resolve("admin.service.reset"),
        Some(OperationClass::Admin)
    ));
}

#[test]
fn meta_operations_are_open() {
    let table = default_table();
    assert!(matches!(
        table.resolve("meta.health"),
        Some(OperationClass::Open)
    ));
}

#[test]
fn unknown_and_malformed_names_do_not_resolve() {
    let table = default_table();
    assert!(table.resolve("eventlog.dump").is_none());
    assert!(table.resolve("").is_none());
    assert!(table.resolve(" eventlog.query").is_none());
    assert!(table.resolve("eventlog.query\n").is_none());
}
