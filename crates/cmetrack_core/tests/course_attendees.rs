use cmetrack_core::db::open_db_in_memory;
use cmetrack_core::model::course::{AttendeeRole, CourseStatus, EnrollmentStatus, NewCourse};
use cmetrack_core::model::meeting::NewMeeting;
use cmetrack_core::model::person::{NewPerson, PersonStatus};
use cmetrack_core::repo::course_repo::SqliteCourseRepository;
use cmetrack_core::repo::meeting_repo::SqliteMeetingRepository;
use cmetrack_core::repo::person_repo::SqlitePersonRepository;
use cmetrack_core::{
    AttendeeRequest, ErrorKind, PageRequest, QueryParams, QuickAddResolver, ResourceRepository,
};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

fn count_people(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM people;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn course_number_is_unique() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCourseRepository::new(&conn);

    let created = repo.create(&NewCourse::new("SURG-101", "Surgical Basics")).unwrap();
    assert_eq!(created.status, CourseStatus::Draft);
    assert_eq!(created.attendee_count, 0);

    let err = repo
        .create(&NewCourse::new("SURG-101", "Another"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.public_message(), "course number already exists");
}

#[test]
fn create_rejects_inverted_dates_and_missing_references() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCourseRepository::new(&conn);

    let inverted = NewCourse {
        start_date: NaiveDate::from_ymd_opt(2025, 5, 2),
        end_date: NaiveDate::from_ymd_opt(2025, 5, 1),
        ..NewCourse::new("C-1", "Course")
    };
    assert_eq!(repo.create(&inverted).unwrap_err().kind(), ErrorKind::Validation);

    let dangling = NewCourse {
        chair_id: Some(Uuid::new_v4()),
        ..NewCourse::new("C-2", "Course")
    };
    assert_eq!(repo.create(&dangling).unwrap_err().kind(), ErrorKind::Validation);
}

#[test]
fn update_rejects_dates_that_would_invert_the_stored_range() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCourseRepository::new(&conn);
    let course = repo
        .create(&NewCourse {
            start_date: NaiveDate::from_ymd_opt(2025, 3, 10),
            end_date: NaiveDate::from_ymd_opt(2025, 3, 20),
            ..NewCourse::new("C-1", "Course")
        })
        .unwrap();

    let err = repo
        .update(course.id, json!({"end_date": "2025-01-01"}).as_object().unwrap())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = repo
        .update(course.id, json!({"start_date": "2025-04-01"}).as_object().unwrap())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let stored = repo.get(course.id).unwrap();
    assert_eq!(stored.course.end_date, NaiveDate::from_ymd_opt(2025, 3, 20));

    let cleared = repo
        .update(
            course.id,
            json!({"end_date": null, "start_date": "2025-04-01"}).as_object().unwrap(),
        )
        .unwrap();
    assert_eq!(cleared.start_date, NaiveDate::from_ymd_opt(2025, 4, 1));
    assert_eq!(cleared.end_date, None);
}

#[test]
fn quick_add_creates_incomplete_person_and_enrollment() {
    let conn = open_db_in_memory().unwrap();
    let course = SqliteCourseRepository::new(&conn)
        .create(&NewCourse::new("SURG-101", "Surgical Basics"))
        .unwrap();
    let resolver = QuickAddResolver::new(&conn);

    let outcome = resolver
        .add_course_attendee(course.id, &AttendeeRequest::quick("Ann", "Lee"))
        .unwrap();
    assert!(outcome.person_created);
    assert_eq!(outcome.attendee.display_name, "Ann Lee");
    assert_eq!(outcome.attendee.role, AttendeeRole::Attendee);
    assert_eq!(outcome.attendee.status, EnrollmentStatus::Enrolled);
    assert!(!outcome.attendee.is_complete);
    assert_eq!(count_people(&conn), 1);

    let person = SqlitePersonRepository::new(&conn)
        .find(outcome.attendee.person_id)
        .unwrap()
        .unwrap();
    assert!(!person.is_complete);
    assert_eq!(person.status, PersonStatus::Active);

    let err = resolver
        .add_course_attendee(
            course.id,
            &AttendeeRequest::existing(outcome.attendee.person_id),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.public_message(), "person is already enrolled in this course");
    assert_eq!(count_people(&conn), 1);

    let detail = SqliteCourseRepository::new(&conn).get(course.id).unwrap();
    assert_eq!(detail.attendees.len(), 1);
    assert_eq!(detail.course.attendee_count, 1);
}

#[test]
fn quick_add_reuses_person_with_matching_email() {
    let conn = open_db_in_memory().unwrap();
    let mut draft = NewPerson::new("Ann", "Lee");
    draft.email = Some("ann@example.org".to_string());
    let existing = SqlitePersonRepository::new(&conn).create(&draft).unwrap();
    let course = SqliteCourseRepository::new(&conn)
        .create(&NewCourse::new("SURG-101", "Surgical Basics"))
        .unwrap();

    let outcome = QuickAddResolver::new(&conn)
        .add_course_attendee(
            course.id,
            &AttendeeRequest::quick("Annie", "Lee").with_email("ANN@example.org"),
        )
        .unwrap();
    assert!(!outcome.person_created);
    assert_eq!(outcome.attendee.person_id, existing.id);
    assert_eq!(count_people(&conn), 1);
}

#[test]
fn quick_add_rolls_back_person_when_join_insert_fails() {
    let conn = open_db_in_memory().unwrap();

    let err = QuickAddResolver::new(&conn)
        .add_course_attendee(Uuid::new_v4(), &AttendeeRequest::quick("Ann", "Lee"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(count_people(&conn), 0);

    // The connection stays usable after the rollback.
    SqlitePersonRepository::new(&conn)
        .create(&NewPerson::new("Bo", "Kim"))
        .unwrap();
    assert_eq!(count_people(&conn), 1);
}

#[test]
fn quick_add_requires_names() {
    let conn = open_db_in_memory().unwrap();
    let course = SqliteCourseRepository::new(&conn)
        .create(&NewCourse::new("SURG-101", "Surgical Basics"))
        .unwrap();

    let err = QuickAddResolver::new(&conn)
        .add_course_attendee(course.id, &AttendeeRequest::quick("Ann", "  "))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(count_people(&conn), 0);
}

#[test]
fn quick_add_registers_meeting_attendance() {
    let conn = open_db_in_memory().unwrap();
    let meeting = SqliteMeetingRepository::new(&conn)
        .create(&NewMeeting::new(
            "Grand Rounds",
            NaiveDate::from_ymd_opt(2025, 3, 4).unwrap(),
        ))
        .unwrap();

    let request = AttendeeRequest {
        attended: Some(true),
        ..AttendeeRequest::quick("Ann", "Lee")
    };
    let outcome = QuickAddResolver::new(&conn)
        .add_meeting_attendee(meeting.id, &request)
        .unwrap();
    assert!(outcome.person_created);
    assert!(outcome.attendee.attended);

    let err = QuickAddResolver::new(&conn)
        .add_meeting_attendee(meeting.id, &AttendeeRequest::existing(outcome.attendee.person_id))
        .unwrap_err();
    assert_eq!(err.public_message(), "person is already attending this meeting");
}

#[test]
fn attendee_update_remove_and_filtered_listing() {
    let conn = open_db_in_memory().unwrap();
    let people = SqlitePersonRepository::new(&conn);
    let courses = SqliteCourseRepository::new(&conn);
    let course = courses.create(&NewCourse::new("C-1", "Course")).unwrap();
    let ann = people.create(&NewPerson::new("Ann", "Lee")).unwrap();
    let bo = people.create(&NewPerson::new("Bo", "Kim")).unwrap();

    courses
        .add_attendee(course.id, ann.id, AttendeeRole::Instructor)
        .unwrap();
    courses
        .add_attendee(course.id, bo.id, AttendeeRole::Attendee)
        .unwrap();

    let updated = courses
        .update_attendee(
            course.id,
            bo.id,
            json!({"status": "completed"}).as_object().unwrap(),
        )
        .unwrap();
    assert_eq!(updated.status, EnrollmentStatus::Completed);

    let instructors = courses
        .list_attendees(course.id, &QueryParams::new().with("role", "instructor"))
        .unwrap();
    assert_eq!(instructors.len(), 1);
    assert_eq!(instructors[0].person_id, ann.id);

    let all = courses.list_attendees(course.id, &QueryParams::new()).unwrap();
    let names: Vec<&str> = all.iter().map(|a| a.display_name.as_str()).collect();
    assert_eq!(names, ["Bo Kim", "Ann Lee"]);

    assert!(courses.remove_attendee(course.id, ann.id).unwrap().deleted);
    assert_eq!(
        courses.remove_attendee(course.id, ann.id).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn course_detail_hydrates_roles_and_meetings_in_date_order() {
    let conn = open_db_in_memory().unwrap();
    let chair = SqlitePersonRepository::new(&conn)
        .create(&NewPerson {
            title: Some("Dr.".to_string()),
            ..NewPerson::new("Ann", "Lee")
        })
        .unwrap();
    let courses = SqliteCourseRepository::new(&conn);
    let course = courses
        .create(&NewCourse {
            chair_id: Some(chair.id),
            status: Some(CourseStatus::Active),
            ..NewCourse::new("C-1", "Course")
        })
        .unwrap();

    let meetings = SqliteMeetingRepository::new(&conn);
    for (title, day) in [("Second", 12), ("First", 5)] {
        meetings
            .create(&NewMeeting {
                course_id: Some(course.id),
                ..NewMeeting::new(title, NaiveDate::from_ymd_opt(2025, 3, day).unwrap())
            })
            .unwrap();
    }

    let detail = courses.get(course.id).unwrap();
    assert_eq!(detail.roles.chair.unwrap().display_name, "Dr. Ann Lee");
    assert!(detail.roles.admin.is_none());
    let titles: Vec<&str> = detail.meetings.iter().map(|m| m.title.as_str()).collect();
    assert_eq!(titles, ["First", "Second"]);

    let active = courses
        .list(&QueryParams::new().with("status", "active"), PageRequest::default())
        .unwrap();
    assert_eq!(active.total, 1);
}
