use uuid::Uuid;

/// Issues a stable anonymous identity token for one client session. Called
/// once per client before any matchmaking request is made.
pub fn anonymous_identity() -> String {
    Uuid::new_v4().to_string()
}
