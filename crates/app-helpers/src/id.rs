/// A new lowercase ULID.
///
/// Sortable by creation time and safe to use as a file or directory name.
#[must_use]
pub fn ulid_id() -> String {
    let mut id = ulid::Ulid::new().to_string();
    id.make_ascii_lowercase();
    id
}
