use chrono::{NaiveDate, Utc};

use cardioportal_auth::{AccessKind, ContentPermissions, Principal};
use cardioportal_core::{CompanyId, DeviceId, DomainError, GroupId, UserId};
use cardioportal_infra::InMemoryPortalStore;
use cardioportal_portal::{
    AccessSelection, Company, CreateUserInput, Device, DeviceStatus, Group, PortalService,
    PortalStore, ReferenceSnapshot, SEARCH_LIMIT, ServiceError, UpdateUserInput, User,
};

const ADMIN_EMAIL: &str = "admin@cardio.test";
const PASSWORD: &str = "correct-horse";

struct Fixture {
    service: PortalService<InMemoryPortalStore>,
    admin: Principal,
    abanca: GroupId,
    other_group: GroupId,
    coruna: CompanyId,
    foreign_company: CompanyId,
    dea001: DeviceId,
}

fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d)
}

fn device(serial: &str, company: &str, group: &str, next: Option<NaiveDate>) -> Device {
    Device {
        id: DeviceId::new(),
        serial_number: serial.to_string(),
        company_name: company.to_string(),
        group_name: group.to_string(),
        status: DeviceStatus::Active,
        model: Some("Samaritan PAD 360P".to_string()),
        location: None,
        installed_at: None,
        last_review_date: None,
        next_review_date: next,
    }
}

async fn fixture() -> Fixture {
    let abanca = Group {
        id: GroupId::new(),
        code: "ABANCA".into(),
        name: "ABANCA".into(),
    };
    let other = Group {
        id: GroupId::new(),
        code: "OTRO".into(),
        name: "Otro Grupo".into(),
    };
    let coruna = Company {
        id: CompanyId::new(),
        code: "ABC-COR".into(),
        name: "Abanca Coruña".into(),
        group_code: "ABANCA".into(),
    };
    let foreign = Company {
        id: CompanyId::new(),
        code: "OTR-01".into(),
        name: "Otra Empresa".into(),
        group_code: "OTRO".into(),
    };
    let dea001 = device("DEA001", "Abanca Coruña", "ABANCA", date(2024, 6, 15));

    let snapshot = ReferenceSnapshot {
        groups: vec![abanca.clone(), other.clone()],
        companies: vec![coruna.clone(), foreign.clone()],
        devices: vec![
            device("DEA003", "Abanca Coruña", "ABANCA", date(2025, 3, 1)),
            dea001.clone(),
            device("DEA002", "Abanca Coruña", "ABANCA", date(2024, 12, 31)),
            device("DEA900", "Otra Empresa", "Otro Grupo", date(2024, 1, 1)),
        ],
    };

    let service = PortalService::new(InMemoryPortalStore::with_references(snapshot));
    let admin = service
        .bootstrap_admin(ADMIN_EMAIL, PASSWORD)
        .await
        .unwrap()
        .unwrap()
        .principal();

    Fixture {
        service,
        admin,
        abanca: abanca.id,
        other_group: other.id,
        coruna: coruna.id,
        foreign_company: foreign.id,
        dea001: dea001.id,
    }
}

fn create_input(email: &str, selection: AccessSelection) -> CreateUserInput {
    CreateUserInput {
        email: email.to_string(),
        first_name: "Lucía".to_string(),
        last_name: "Pérez".to_string(),
        password: PASSWORD.to_string(),
        selection,
        permissions: ContentPermissions::default(),
    }
}

fn update_input(user: &User, selection: AccessSelection) -> UpdateUserInput {
    UpdateUserInput {
        email: user.email.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        selection,
        permissions: user.permissions,
        active: user.active,
        password: None,
    }
}

fn selection(role: AccessKind, group: Option<GroupId>, company: Option<CompanyId>, device: Option<DeviceId>) -> AccessSelection {
    AccessSelection {
        role,
        group_id: group,
        company_id: company,
        device_id: device,
    }
}

fn domain(err: ServiceError) -> DomainError {
    match err {
        ServiceError::Domain(e) => e,
        other => panic!("expected a domain error, got {other:?}"),
    }
}

/// Insert a user straight into the store, skipping password hashing.
async fn raw_user(store: &InMemoryPortalStore, email: &str, first_name: &str) -> User {
    let now = Utc::now();
    let user = User {
        id: UserId::new(),
        email: email.to_string(),
        first_name: first_name.to_string(),
        last_name: String::new(),
        access_kind: AccessKind::Group,
        access_id: Some("ABANCA".to_string()),
        group_id: None,
        company_id: None,
        device_id: None,
        permissions: ContentPermissions::default(),
        active: true,
        password_hash: "not-a-hash".to_string(),
        created_at: now,
        updated_at: now,
    };
    store.insert_user(&user).await.unwrap();
    user
}

#[tokio::test]
async fn group_user_sees_group_devices_ordered_by_next_review() {
    let fx = fixture().await;
    let user = fx
        .service
        .create_user(&fx.admin, create_input("grupo@abanca.test", selection(AccessKind::Group, Some(fx.abanca), None, None)))
        .await
        .unwrap();

    assert_eq!(user.access_kind, AccessKind::Group);
    assert_eq!(user.access_id.as_deref(), Some("ABANCA"));

    let devices = fx.service.list_devices_for_principal(&user.principal()).await.unwrap();
    let serials: Vec<&str> = devices.iter().map(|d| d.serial_number.as_str()).collect();
    assert_eq!(serials, vec!["DEA001", "DEA002", "DEA003"]);
}

#[tokio::test]
async fn admin_lists_every_device() {
    let fx = fixture().await;
    let devices = fx.service.list_devices_for_principal(&fx.admin).await.unwrap();
    assert_eq!(devices.len(), 4);
}

#[tokio::test]
async fn device_user_is_created_with_serial_and_sees_one_device() {
    let fx = fixture().await;
    let user = fx
        .service
        .create_user(&fx.admin, create_input("dea@abanca.test", selection(AccessKind::Device, None, None, Some(fx.dea001))))
        .await
        .unwrap();

    assert_eq!(user.access_id.as_deref(), Some("DEA001"));
    assert_eq!(user.device_id, Some(fx.dea001));

    let principal = user.principal();
    let devices = fx.service.list_devices_for_principal(&principal).await.unwrap();
    assert_eq!(devices.len(), 1);

    let err = fx.service.device_for_principal(&principal, "DEA002").await.unwrap_err();
    assert_eq!(domain(err), DomainError::not_found("device"));
}

#[tokio::test]
async fn company_user_stores_company_code() {
    let fx = fixture().await;
    let user = fx
        .service
        .create_user(
            &fx.admin,
            create_input("empresa@abanca.test", selection(AccessKind::Company, Some(fx.abanca), Some(fx.coruna), None)),
        )
        .await
        .unwrap();
    assert_eq!(user.access_id.as_deref(), Some("ABC-COR"));

    let devices = fx.service.list_devices_for_principal(&user.principal()).await.unwrap();
    let serials: Vec<&str> = devices.iter().map(|d| d.serial_number.as_str()).collect();
    assert_eq!(serials, vec!["DEA001", "DEA002", "DEA003"]);
}

#[tokio::test]
async fn missing_and_unknown_references_are_rejected() {
    let fx = fixture().await;

    let err = fx
        .service
        .create_user(&fx.admin, create_input("a@x.test", selection(AccessKind::Group, None, None, None)))
        .await
        .unwrap_err();
    assert_eq!(domain(err), DomainError::missing("group"));

    let err = fx
        .service
        .create_user(&fx.admin, create_input("b@x.test", selection(AccessKind::Company, Some(fx.abanca), None, None)))
        .await
        .unwrap_err();
    assert_eq!(domain(err), DomainError::missing("company"));

    let err = fx
        .service
        .create_user(&fx.admin, create_input("c@x.test", selection(AccessKind::Device, None, None, Some(DeviceId::new()))))
        .await
        .unwrap_err();
    assert_eq!(domain(err), DomainError::not_found("device"));

    let err = fx
        .service
        .create_user(
            &fx.admin,
            create_input("d@x.test", selection(AccessKind::Company, Some(fx.abanca), Some(fx.foreign_company), None)),
        )
        .await
        .unwrap_err();
    assert!(matches!(domain(err), DomainError::Validation(_)));

    assert_eq!(fx.service.list_users(&fx.admin).await.unwrap().len(), 1);
}

#[tokio::test]
async fn non_admin_cannot_manage_users() {
    let fx = fixture().await;
    let user = fx
        .service
        .create_user(&fx.admin, create_input("grupo@abanca.test", selection(AccessKind::Group, Some(fx.abanca), None, None)))
        .await
        .unwrap();
    let principal = user.principal();

    let err = fx
        .service
        .create_user(&principal, create_input("x@x.test", AccessSelection::admin()))
        .await
        .unwrap_err();
    assert_eq!(domain(err), DomainError::Unauthorized);

    let err = fx.service.delete_user(&principal, fx.admin.user_id).await.unwrap_err();
    assert_eq!(domain(err), DomainError::Unauthorized);

    let err = fx.service.search_users(&principal, "admin").await.unwrap_err();
    assert_eq!(domain(err), DomainError::Unauthorized);
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let fx = fixture().await;
    let err = fx
        .service
        .create_user(&fx.admin, create_input(" ADMIN@cardio.test ", AccessSelection::admin()))
        .await
        .unwrap_err();
    assert!(matches!(domain(err), DomainError::Conflict(_)));
}

#[tokio::test]
async fn update_to_taken_email_is_a_conflict() {
    let fx = fixture().await;
    let user = fx
        .service
        .create_user(&fx.admin, create_input("grupo@abanca.test", selection(AccessKind::Group, Some(fx.abanca), None, None)))
        .await
        .unwrap();

    let mut input = update_input(&user, selection(AccessKind::Group, Some(fx.abanca), None, None));
    input.email = ADMIN_EMAIL.to_string();
    let err = fx.service.update_user(&fx.admin, user.id, input).await.unwrap_err();
    assert!(matches!(domain(err), DomainError::Conflict(_)));
}

#[tokio::test]
async fn update_moves_user_to_another_scope() {
    let fx = fixture().await;
    let user = fx
        .service
        .create_user(&fx.admin, create_input("grupo@abanca.test", selection(AccessKind::Group, Some(fx.abanca), None, None)))
        .await
        .unwrap();

    let input = update_input(&user, selection(AccessKind::Group, Some(fx.other_group), Some(fx.coruna), None));
    let updated = fx.service.update_user(&fx.admin, user.id, input).await.unwrap();
    assert_eq!(updated.access_id.as_deref(), Some("OTRO"));
    assert_eq!(updated.company_id, None);

    // Stored code "OTRO" still reaches devices carrying the group name.
    let devices = fx.service.list_devices_for_principal(&updated.principal()).await.unwrap();
    let serials: Vec<&str> = devices.iter().map(|d| d.serial_number.as_str()).collect();
    assert_eq!(serials, vec!["DEA900"]);
}

#[tokio::test]
async fn deactivated_admin_loses_admin_rights() {
    let fx = fixture().await;
    let second = fx
        .service
        .create_user(&fx.admin, create_input("segundo@cardio.test", AccessSelection::admin()))
        .await
        .unwrap();
    let principal = second.principal();
    assert!(fx.service.list_users(&principal).await.is_ok());

    fx.service.deactivate_user(&fx.admin, second.id).await.unwrap();

    let err = fx.service.list_users(&principal).await.unwrap_err();
    assert_eq!(domain(err), DomainError::Unauthorized);
    let err = fx
        .service
        .create_user(&principal, create_input("x@x.test", AccessSelection::admin()))
        .await
        .unwrap_err();
    assert_eq!(domain(err), DomainError::Unauthorized);
}

#[tokio::test]
async fn deleted_or_demoted_admin_loses_admin_rights() {
    let fx = fixture().await;
    let second = fx
        .service
        .create_user(&fx.admin, create_input("segundo@cardio.test", AccessSelection::admin()))
        .await
        .unwrap();
    let stale = second.principal();

    let input = update_input(&second, selection(AccessKind::Group, Some(fx.abanca), None, None));
    fx.service.update_user(&fx.admin, second.id, input).await.unwrap();
    let err = fx.service.search_users(&stale, "admin").await.unwrap_err();
    assert_eq!(domain(err), DomainError::Unauthorized);

    fx.service.delete_user(&fx.admin, second.id).await.unwrap();
    let err = fx
        .service
        .create_user(&stale, create_input("x@x.test", AccessSelection::admin()))
        .await
        .unwrap_err();
    assert_eq!(domain(err), DomainError::Unauthorized);
    assert_eq!(fx.service.list_users(&fx.admin).await.unwrap().len(), 1);
}

#[tokio::test]
async fn admin_cannot_remove_or_deactivate_self() {
    let fx = fixture().await;
    let me = fx.admin.user_id;

    let err = fx.service.delete_user(&fx.admin, me).await.unwrap_err();
    assert_eq!(domain(err), DomainError::SelfActionForbidden);

    let err = fx.service.deactivate_user(&fx.admin, me).await.unwrap_err();
    assert_eq!(domain(err), DomainError::SelfActionForbidden);

    let current = fx.service.get_user(&fx.admin, me).await.unwrap();
    let mut input = update_input(&current, AccessSelection::admin());
    input.active = false;
    let err = fx.service.update_user(&fx.admin, me, input).await.unwrap_err();
    assert_eq!(domain(err), DomainError::SelfActionForbidden);

    assert!(fx.service.get_user(&fx.admin, me).await.unwrap().active);
}

#[tokio::test]
async fn deactivated_user_cannot_log_in_until_reactivated() {
    let fx = fixture().await;
    let user = fx
        .service
        .create_user(&fx.admin, create_input("grupo@abanca.test", selection(AccessKind::Group, Some(fx.abanca), None, None)))
        .await
        .unwrap();

    fx.service.authenticate("grupo@abanca.test", PASSWORD).await.unwrap();

    let deactivated = fx.service.deactivate_user(&fx.admin, user.id).await.unwrap();
    assert!(!deactivated.active);
    let err = fx.service.authenticate("grupo@abanca.test", PASSWORD).await.unwrap_err();
    assert_eq!(domain(err), DomainError::InvalidCredentials);

    fx.service.activate_user(&fx.admin, user.id).await.unwrap();
    fx.service.authenticate("GRUPO@abanca.test", PASSWORD).await.unwrap();
}

#[tokio::test]
async fn delete_removes_the_record() {
    let fx = fixture().await;
    let user = fx
        .service
        .create_user(&fx.admin, create_input("grupo@abanca.test", selection(AccessKind::Group, Some(fx.abanca), None, None)))
        .await
        .unwrap();

    fx.service.delete_user(&fx.admin, user.id).await.unwrap();
    let err = fx.service.get_user(&fx.admin, user.id).await.unwrap_err();
    assert_eq!(domain(err), DomainError::not_found("user"));

    let err = fx.service.delete_user(&fx.admin, user.id).await.unwrap_err();
    assert_eq!(domain(err), DomainError::not_found("user"));
}

#[tokio::test]
async fn short_search_terms_return_nothing() {
    let fx = fixture().await;
    assert!(fx.service.search_users(&fx.admin, "a").await.unwrap().is_empty());
    assert!(fx.service.search_users(&fx.admin, "  a ").await.unwrap().is_empty());
    assert_eq!(fx.service.search_users(&fx.admin, "ADMIN").await.unwrap().len(), 1);
}

#[tokio::test]
async fn search_is_capped() {
    let fx = fixture().await;
    for i in 0..(SEARCH_LIMIT + 5) {
        raw_user(fx.service.store(), &format!("tecnico{i:03}@cardio.test"), "Técnico").await;
    }
    let hits = fx.service.search_users(&fx.admin, "tecnico").await.unwrap();
    assert_eq!(hits.len(), SEARCH_LIMIT);
    assert_eq!(hits[0].email, "tecnico000@cardio.test");
}

#[tokio::test]
async fn edit_form_recovers_selector_ids() {
    let fx = fixture().await;
    let user = fx
        .service
        .create_user(
            &fx.admin,
            create_input("empresa@abanca.test", selection(AccessKind::Company, Some(fx.abanca), Some(fx.coruna), None)),
        )
        .await
        .unwrap();

    let (_, form, options) = fx.service.user_form(&fx.admin, user.id).await.unwrap();
    assert!(form.warnings.is_empty());
    assert_eq!(form.selection.group_id, Some(fx.abanca));
    assert_eq!(form.selection.company_id, Some(fx.coruna));
    assert_eq!(options.companies.len(), 1);
    assert_eq!(options.devices.len(), 3);
}

#[tokio::test]
async fn edit_form_flags_dangling_business_keys() {
    let fx = fixture().await;
    let mut user = raw_user(fx.service.store(), "huerfano@cardio.test", "Huérfano").await;
    user.access_id = Some("DESAPARECIDO".to_string());
    fx.service.store().update_user(&user).await.unwrap();

    let (_, form, options) = fx.service.user_form(&fx.admin, user.id).await.unwrap();
    assert_eq!(form.selection.group_id, None);
    assert_eq!(form.warnings.len(), 1);
    assert!(options.companies.is_empty());
}

#[tokio::test]
async fn password_change_requires_current_password() {
    let fx = fixture().await;

    let err = fx
        .service
        .change_own_password(&fx.admin, "wrong-password", "another-secret")
        .await
        .unwrap_err();
    assert_eq!(domain(err), DomainError::InvalidCredentials);

    let err = fx.service.change_own_password(&fx.admin, PASSWORD, "short").await.unwrap_err();
    assert!(matches!(domain(err), DomainError::Validation(_)));

    fx.service
        .change_own_password(&fx.admin, PASSWORD, "another-secret")
        .await
        .unwrap();
    fx.service.authenticate(ADMIN_EMAIL, "another-secret").await.unwrap();
}

#[tokio::test]
async fn bootstrap_is_idempotent() {
    let fx = fixture().await;
    assert!(fx.service.bootstrap_admin(ADMIN_EMAIL, PASSWORD).await.unwrap().is_none());
}
