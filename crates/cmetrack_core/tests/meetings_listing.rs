use chrono::NaiveDate;
use cmetrack_core::db::open_db_in_memory;
use cmetrack_core::model::meeting::{Meeting, MeetingStatus, NewMeeting};
use cmetrack_core::model::person::NewPerson;
use cmetrack_core::repo::meeting_repo::SqliteMeetingRepository;
use cmetrack_core::repo::person_repo::SqlitePersonRepository;
use cmetrack_core::{ErrorKind, PageRequest, QueryParams, ResourceRepository};
use rusqlite::Connection;
use serde_json::json;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
}

const TODAY: u32 = 10;

/// Past/future meetings with a mix of flags, seen from 2025-03-10.
fn seed(conn: &Connection) {
    let repo = SqliteMeetingRepository::with_today(conn, day(TODAY));
    let rows = [
        ("past scheduled", 3, MeetingStatus::Scheduled, Some("08:00")),
        ("past completed", 4, MeetingStatus::Completed, None),
        ("today scheduled", TODAY, MeetingStatus::Scheduled, Some("12:00")),
        ("today early", TODAY, MeetingStatus::Scheduled, Some("07:30")),
        ("future completed", 20, MeetingStatus::Completed, None),
        ("future scheduled", 15, MeetingStatus::Scheduled, None),
        ("future cancelled", 18, MeetingStatus::Cancelled, None),
    ];
    for (title, d, status, start) in rows {
        repo.create(&NewMeeting {
            status: Some(status),
            start_time: start.map(str::to_string),
            ..NewMeeting::new(title, day(d))
        })
        .unwrap();
    }
}

fn list(conn: &Connection, status: &str) -> Vec<Meeting> {
    let repo = SqliteMeetingRepository::with_today(conn, day(TODAY));
    let params = QueryParams::new().with("status", status);
    let page = repo.list(&params, PageRequest::new(1, 100)).unwrap();
    assert_eq!(page.total as usize, page.data.len());
    page.data
}

fn titles(meetings: &[Meeting]) -> Vec<&str> {
    meetings.iter().map(|m| m.title.as_str()).collect()
}

#[test]
fn scheduled_filter_excludes_past_rows_and_sorts_soonest_first() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);

    let scheduled = list(&conn, "scheduled");
    assert!(scheduled.iter().all(|m| m.meeting_date >= day(TODAY)));
    assert!(scheduled.iter().all(|m| m.status == MeetingStatus::Scheduled));
    assert_eq!(
        titles(&scheduled),
        ["today early", "today scheduled", "future scheduled"]
    );
}

#[test]
fn completed_filter_includes_every_past_row_and_every_completed_flag() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);

    let completed = list(&conn, "COMPLETED");
    assert_eq!(
        titles(&completed),
        ["future completed", "past completed", "past scheduled"]
    );
}

#[test]
fn cancelled_filter_uses_flag_only_and_all_disables_status() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);

    assert_eq!(titles(&list(&conn, "cancelled")), ["future cancelled"]);

    let all = list(&conn, "all");
    assert_eq!(all.len(), 7);
    assert_eq!(all[0].title, "future completed");
    assert_eq!(all[6].title, "past scheduled");
}

#[test]
fn date_bounds_and_search_combine() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let repo = SqliteMeetingRepository::with_today(&conn, day(TODAY));

    let params = QueryParams::new()
        .with("from", "2025-03-04")
        .with("to", "2025-03-15")
        .with("search", "FUTURE");
    let page = repo.list(&params, PageRequest::default()).unwrap();
    assert_eq!(titles(&page.data), ["future scheduled"]);

    let ignored = QueryParams::new().with("from", "not-a-date");
    assert_eq!(repo.list(&ignored, PageRequest::default()).unwrap().total, 7);
}

#[test]
fn create_validates_title_date_and_times() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteMeetingRepository::new(&conn);

    let missing_date = NewMeeting {
        title: "Rounds".to_string(),
        ..NewMeeting::default()
    };
    assert_eq!(repo.create(&missing_date).unwrap_err().kind(), ErrorKind::Validation);

    let bad_time = NewMeeting {
        start_time: Some("25:00".to_string()),
        ..NewMeeting::new("Rounds", day(1))
    };
    assert_eq!(repo.create(&bad_time).unwrap_err().kind(), ErrorKind::Validation);

    let inverted = NewMeeting {
        start_time: Some("10:00".to_string()),
        end_time: Some("09:00".to_string()),
        ..NewMeeting::new("Rounds", day(1))
    };
    assert_eq!(repo.create(&inverted).unwrap_err().kind(), ErrorKind::Validation);

    assert_eq!(
        repo.create(&NewMeeting::new("  ", day(1))).unwrap_err().kind(),
        ErrorKind::Validation
    );
}

#[test]
fn update_rejects_end_time_before_stored_start_time() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteMeetingRepository::new(&conn);
    let meeting = repo
        .create(&NewMeeting {
            start_time: Some("09:00".to_string()),
            end_time: Some("10:00".to_string()),
            ..NewMeeting::new("Rounds", day(1))
        })
        .unwrap();

    let err = repo
        .update(meeting.id, json!({"end_time": "08:30"}).as_object().unwrap())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(repo.get(meeting.id).unwrap().meeting.end_time.as_deref(), Some("10:00"));

    let moved = repo
        .update(
            meeting.id,
            json!({"start_time": "07:00", "end_time": "08:30"}).as_object().unwrap(),
        )
        .unwrap();
    assert_eq!(moved.end_time.as_deref(), Some("08:30"));
}

#[test]
fn detail_hydrates_presenter_and_attendance() {
    let conn = open_db_in_memory().unwrap();
    let people = SqlitePersonRepository::new(&conn);
    let presenter = people
        .create(&NewPerson {
            title: Some("Dr.".to_string()),
            ..NewPerson::new("Ann", "Lee")
        })
        .unwrap();
    let guest = people.create(&NewPerson::new("Bo", "Kim")).unwrap();

    let repo = SqliteMeetingRepository::new(&conn);
    let meeting = repo
        .create(&NewMeeting {
            presenter_id: Some(presenter.id),
            cme_credits: Some(1.5),
            ..NewMeeting::new("Grand Rounds", day(4))
        })
        .unwrap();
    assert_eq!(meeting.presenter_name.as_deref(), Some("Dr. Ann Lee"));
    assert_eq!(meeting.status, MeetingStatus::Scheduled);

    repo.add_attendee(meeting.id, guest.id, false).unwrap();
    let marked = repo.set_attended(meeting.id, guest.id, true).unwrap();
    assert!(marked.attended);
    assert_eq!(
        repo.add_attendee(meeting.id, guest.id, true).unwrap_err().kind(),
        ErrorKind::Conflict
    );

    let detail = repo.get(meeting.id).unwrap();
    assert_eq!(detail.presenter.unwrap().id, presenter.id);
    assert!(detail.course.is_none());
    assert_eq!(detail.attendees.len(), 1);
    assert_eq!(detail.attendees[0].display_name, "Bo Kim");

    let person_detail = people.get(guest.id).unwrap();
    assert_eq!(person_detail.meetings.len(), 1);

    assert!(repo.remove_attendee(meeting.id, guest.id).unwrap().deleted);
    assert!(repo.list_attendees(meeting.id).unwrap().is_empty());
    assert_eq!(
        repo.set_attended(meeting.id, guest.id, true).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn update_clears_presenter_and_rejects_bad_status() {
    let conn = open_db_in_memory().unwrap();
    let presenter = SqlitePersonRepository::new(&conn)
        .create(&NewPerson::new("Ann", "Lee"))
        .unwrap();
    let repo = SqliteMeetingRepository::new(&conn);
    let meeting = repo
        .create(&NewMeeting {
            presenter_id: Some(presenter.id),
            ..NewMeeting::new("Rounds", day(4))
        })
        .unwrap();

    let updated = repo
        .update(
            meeting.id,
            json!({"presenter_id": null, "status": "cancelled"})
                .as_object()
                .unwrap(),
        )
        .unwrap();
    assert_eq!(updated.presenter_id, None);
    assert_eq!(updated.presenter_name, None);
    assert_eq!(updated.status, MeetingStatus::Cancelled);

    let err = repo
        .update(meeting.id, json!({"status": "postponed"}).as_object().unwrap())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}
