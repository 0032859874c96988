use chrono::DateTime;
use parcel_core::db::open_db_in_memory;
use parcel_core::{
    ParcelRepository, ParcelService, ParcelStatus, RepoError, ServiceError,
    SqliteParcelRepository,
};

#[test]
fn register_stores_registered_parcel_with_timestamp() {
    let conn = open_db_in_memory().unwrap();
    let service = ParcelService::new(SqliteParcelRepository::try_new(&conn).unwrap());

    let parcel = service.register(1000, "Main St").unwrap();
    assert!(parcel.number > 0);
    assert_eq!(parcel.status, ParcelStatus::Registered);
    assert!(DateTime::parse_from_rfc3339(&parcel.created_at).is_ok());

    assert_eq!(service.get(parcel.number).unwrap(), parcel);
}

#[test]
fn next_status_walks_delivery_flow() {
    let conn = open_db_in_memory().unwrap();
    let service = ParcelService::new(SqliteParcelRepository::try_new(&conn).unwrap());
    let number = service.register(1, "Main St").unwrap().number;

    assert_eq!(service.next_status(number).unwrap(), ParcelStatus::Sent);
    assert_eq!(service.next_status(number).unwrap(), ParcelStatus::Delivered);
    assert_eq!(service.next_status(number).unwrap(), ParcelStatus::Delivered);
    assert_eq!(service.get(number).unwrap().status, ParcelStatus::Delivered);
}

#[test]
fn next_status_rejects_unknown_status() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteParcelRepository::try_new(&conn).unwrap();
    let service = ParcelService::new(SqliteParcelRepository::try_new(&conn).unwrap());
    let number = service.register(1, "Main St").unwrap().number;
    repo.set_status(number, &ParcelStatus::parse("held_at_customs"))
        .unwrap();

    let err = service.next_status(number).unwrap_err();
    assert!(matches!(err, ServiceError::UnknownTransition { .. }));
    assert!(err.to_string().contains("held_at_customs"));
}

#[test]
fn next_status_on_missing_parcel_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = ParcelService::new(SqliteParcelRepository::try_new(&conn).unwrap());

    let err = service.next_status(9).unwrap_err();
    assert!(matches!(err, ServiceError::Repo(RepoError::NotFound(9))));
}

#[test]
fn change_address_and_delete_respect_status_guard() {
    let conn = open_db_in_memory().unwrap();
    let service = ParcelService::new(SqliteParcelRepository::try_new(&conn).unwrap());
    let number = service.register(3, "Main St").unwrap().number;

    service.change_address(number, "Oak St").unwrap();
    assert_eq!(service.get(number).unwrap().address, "Oak St");

    service.next_status(number).unwrap();
    let err = service.change_address(number, "Elm St").unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Repo(RepoError::PreconditionFailed { .. })
    ));
    assert!(matches!(
        service.delete(number),
        Err(ServiceError::Repo(RepoError::PreconditionFailed { .. }))
    ));
    assert_eq!(service.get(number).unwrap().address, "Oak St");
}

#[test]
fn client_parcels_lists_registered_parcels() {
    let conn = open_db_in_memory().unwrap();
    let service = ParcelService::new(SqliteParcelRepository::try_new(&conn).unwrap());

    let first = service.register(11, "A St").unwrap();
    let second = service.register(11, "B St").unwrap();
    service.register(12, "C St").unwrap();

    let parcels = service.client_parcels(11).unwrap();
    assert_eq!(parcels, vec![first, second]);
    assert!(service.client_parcels(13).unwrap().is_empty());

    let number = parcels[0].number;
    service.delete(number).unwrap();
    assert_eq!(service.client_parcels(11).unwrap().len(), 1);
}
