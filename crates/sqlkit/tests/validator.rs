mod support;
use support::setup;

use pretty_assertions::assert_eq;
use sqlkit::{Options, Validation};
use std_util::{assert_err, assert_ok, assert_some};

const SCHEMA: &str = "
    CREATE TABLE teams (id INTEGER PRIMARY KEY, name TEXT);
    CREATE TABLE members (id INTEGER PRIMARY KEY, name TEXT, email TEXT UNIQUE, team_id INTEGER);
    INSERT INTO teams (id, name) VALUES (1, 'core');
    INSERT INTO members (id, name, email, team_id) VALUES (1, 'ann', 'ann@x.io', 1);
";

#[derive(Debug, Default, sqlkit::Record)]
struct Member {
    #[sqlkit("id,primaryKey")]
    id: i64,
    #[sqlkit("name,required")]
    name: Option<String>,
    #[sqlkit("email,unique,table=members")]
    email: Option<String>,
    #[sqlkit("team_id,refTable=teams,refColumn=id")]
    team_id: Option<i64>,
}

fn member(id: i64, name: Option<&str>, email: &str, team_id: i64) -> Member {
    Member {
        id,
        name: name.map(str::to_string),
        email: Some(email.to_string()),
        team_id: Some(team_id),
    }
}

#[tokio::test]
async fn reports_every_violation() {
    let (db, _conn) = setup(SCHEMA);
    let members = [
        member(2, Some("bob"), "bob@x.io", 1),
        member(3, None, "ann@x.io", 7),
    ];

    let err = assert_err!(
        db.validator()
            .validate(&members, &Validation::new(), &Options::new())
            .await
    );
    assert!(err.is_validation());

    let violations = assert_some!(err.violations());
    let found: Vec<_> = violations
        .iter()
        .map(|v| (v.location.as_str(), v.check))
        .collect();
    assert_eq!(
        found,
        [("[1].name", "notnull"), ("[1].email", "unique"), ("[1].team_id", "refKey")]
    );
    assert_eq!(violations[1].message, "email value: ann@x.io already exists");
}

#[tokio::test]
async fn own_row_is_not_a_duplicate_on_update() {
    let (db, _conn) = setup(SCHEMA);
    let members = [member(1, Some("ann"), "ann@x.io", 1)];

    let validator = db.validator();
    assert_err!(
        validator
            .validate(&members, &Validation::new(), &Options::new())
            .await
    );
    assert_ok!(
        validator
            .validate(&members, &Validation::new().for_update(true), &Options::new())
            .await
    );
}

#[tokio::test]
async fn checks_can_be_disabled() {
    let (db, _conn) = setup(SCHEMA);
    let members = [member(3, None, "ann@x.io", 9)];

    let violations = assert_ok!(
        db.validator()
            .violations(
                &members,
                &Validation::new().unique(false).ref_key(false),
                &Options::new()
            )
            .await
    );
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].check, "notnull");
}
