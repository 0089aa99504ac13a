/// Server-supplied cache validators, used to build `If-Range` so a chunk
/// fetch safely aborts instead of silently fetching bytes from a new version
/// of the resource.
#[derive(Debug, Clone, Default)]
pub struct Validators {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl Validators {
    pub fn if_range_value(&self) -> Option<&str> {
        self.etag.as_deref().or(self.last_modified.as_deref())
    }
}
