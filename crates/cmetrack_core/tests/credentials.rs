use chrono::NaiveDate;
use cmetrack_core::db::open_db_in_memory;
use cmetrack_core::model::credential::{CredentialStatus, IssueCredential, NewCredentialTemplate};
use cmetrack_core::model::person::NewPerson;
use cmetrack_core::repo::credential_repo::{
    SqliteCredentialTemplateRepository, SqliteIssuedCredentialRepository,
};
use cmetrack_core::repo::person_repo::SqlitePersonRepository;
use cmetrack_core::{ErrorKind, PageRequest, QueryParams, ResourceRepository};
use regex::Regex;
use serde_json::json;
use uuid::Uuid;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn template_keeps_field_placements_as_json() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCredentialTemplateRepository::new(&conn);

    let placements = json!([{"field": "name", "x": 120, "y": 300}]);
    let created = repo
        .create(&NewCredentialTemplate {
            name: "BLS Card".to_string(),
            field_placements: Some(placements.clone()),
            ..NewCredentialTemplate::default()
        })
        .unwrap();
    assert_eq!(created.field_placements, placements);
    assert_eq!(created.issued_count, 0);

    let bare = repo
        .create(&NewCredentialTemplate {
            name: "ACLS".to_string(),
            ..NewCredentialTemplate::default()
        })
        .unwrap();
    assert_eq!(bare.field_placements, json!([]));

    let updated = repo
        .update(
            created.id,
            json!({"field_placements": {"layout": "landscape"}})
                .as_object()
                .unwrap(),
        )
        .unwrap();
    assert_eq!(updated.field_placements, json!({"layout": "landscape"}));
}

#[test]
fn issue_generates_numbered_credentials() {
    let conn = open_db_in_memory().unwrap();
    let person = SqlitePersonRepository::new(&conn)
        .create(&NewPerson::new("Ann", "Lee"))
        .unwrap();
    let template = SqliteCredentialTemplateRepository::new(&conn)
        .create(&NewCredentialTemplate {
            name: "BLS Card".to_string(),
            ..NewCredentialTemplate::default()
        })
        .unwrap();
    let repo = SqliteIssuedCredentialRepository::new(&conn);

    let issued = repo
        .issue(&IssueCredential {
            template_id: template.id,
            person_id: person.id,
            issue_date: Some(date(2025, 6, 1)),
            expiry_date: Some(date(2027, 6, 1)),
        })
        .unwrap();
    let pattern = Regex::new(r"^CRED-2025-[0-9A-F]{8}$").unwrap();
    assert!(pattern.is_match(&issued.credential_number));
    assert_eq!(issued.status, CredentialStatus::Active);
    assert_eq!(issued.template_name, "BLS Card");
    assert_eq!(issued.display_name, "Ann Lee");

    let detail = SqlitePersonRepository::new(&conn).get(person.id).unwrap();
    assert_eq!(detail.credentials.len(), 1);

    let template_detail = SqliteCredentialTemplateRepository::new(&conn)
        .get(template.id)
        .unwrap();
    assert_eq!(template_detail.template.issued_count, 1);
    assert_eq!(template_detail.issued[0].id, issued.id);
}

#[test]
fn issue_rejects_missing_rows_and_inverted_dates() {
    let conn = open_db_in_memory().unwrap();
    let person = SqlitePersonRepository::new(&conn)
        .create(&NewPerson::new("Ann", "Lee"))
        .unwrap();
    let template = SqliteCredentialTemplateRepository::new(&conn)
        .create(&NewCredentialTemplate {
            name: "BLS Card".to_string(),
            ..NewCredentialTemplate::default()
        })
        .unwrap();
    let repo = SqliteIssuedCredentialRepository::new(&conn);

    let missing_template = IssueCredential {
        template_id: Uuid::new_v4(),
        person_id: person.id,
        issue_date: None,
        expiry_date: None,
    };
    assert_eq!(repo.issue(&missing_template).unwrap_err().kind(), ErrorKind::NotFound);

    let inverted = IssueCredential {
        template_id: template.id,
        person_id: person.id,
        issue_date: Some(date(2025, 6, 1)),
        expiry_date: Some(date(2025, 5, 1)),
    };
    assert_eq!(repo.issue(&inverted).unwrap_err().kind(), ErrorKind::Validation);
}

#[test]
fn update_rejects_expiry_before_stored_issue_date() {
    let conn = open_db_in_memory().unwrap();
    let person = SqlitePersonRepository::new(&conn)
        .create(&NewPerson::new("Ann", "Lee"))
        .unwrap();
    let template = SqliteCredentialTemplateRepository::new(&conn)
        .create(&NewCredentialTemplate {
            name: "BLS Card".to_string(),
            ..NewCredentialTemplate::default()
        })
        .unwrap();
    let repo = SqliteIssuedCredentialRepository::new(&conn);
    let issued = repo
        .issue(&IssueCredential {
            template_id: template.id,
            person_id: person.id,
            issue_date: Some(date(2025, 6, 1)),
            expiry_date: Some(date(2027, 6, 1)),
        })
        .unwrap();

    let err = repo
        .update(issued.id, json!({"expiry_date": "2025-05-01"}).as_object().unwrap())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = repo
        .update(issued.id, json!({"issue_date": "2028-01-01"}).as_object().unwrap())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let stored = repo.get(issued.id).unwrap();
    assert_eq!(stored.issue_date, date(2025, 6, 1));
    assert_eq!(stored.expiry_date, Some(date(2027, 6, 1)));
}

#[test]
fn expire_lapsed_flips_only_past_active_rows() {
    let conn = open_db_in_memory().unwrap();
    let person = SqlitePersonRepository::new(&conn)
        .create(&NewPerson::new("Ann", "Lee"))
        .unwrap();
    let template = SqliteCredentialTemplateRepository::new(&conn)
        .create(&NewCredentialTemplate {
            name: "BLS Card".to_string(),
            ..NewCredentialTemplate::default()
        })
        .unwrap();
    let repo = SqliteIssuedCredentialRepository::new(&conn);
    let issue = |expiry: Option<NaiveDate>| {
        repo.issue(&IssueCredential {
            template_id: template.id,
            person_id: person.id,
            issue_date: Some(date(2024, 1, 1)),
            expiry_date: expiry,
        })
        .unwrap()
    };

    let lapsed = issue(Some(date(2025, 1, 31)));
    let boundary = issue(Some(date(2025, 2, 1)));
    let open_ended = issue(None);

    assert_eq!(repo.expire_lapsed(date(2025, 2, 1)).unwrap(), 1);
    assert_eq!(repo.get(lapsed.id).unwrap().status, CredentialStatus::Expired);
    assert_eq!(repo.get(boundary.id).unwrap().status, CredentialStatus::Active);
    assert_eq!(repo.get(open_ended.id).unwrap().status, CredentialStatus::Active);

    assert_eq!(repo.expire_lapsed(date(2025, 2, 1)).unwrap(), 0);

    let expired = repo
        .list(&QueryParams::new().with("status", "expired"), PageRequest::default())
        .unwrap();
    assert_eq!(expired.total, 1);
}
