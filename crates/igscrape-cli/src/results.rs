//! The run's result sequence and its durable checkpoint file.

use std::path::{Path, PathBuf};

use igscrape_core::{read_json, write_json_atomic, PersistError, ScrapeResult};

/// In-memory results of the current run, mirrored to a JSON array on disk
/// after every append.
///
/// The file on disk is always a complete earlier state: it is replaced by
/// rename, never written in place.
#[derive(Debug)]
pub(crate) struct ResultStore {
    path: PathBuf,
    results: Vec<ScrapeResult>,
}

impl ResultStore {
    /// Starts an empty store. Nothing is written until the first checkpoint,
    /// which overwrites any file left by an earlier run.
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            results: Vec::new(),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn results(&self) -> &[ScrapeResult] {
        &self.results
    }

    pub(crate) fn len(&self) -> usize {
        self.results.len()
    }

    /// Appends `result` and checkpoints the whole sequence.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] if the checkpoint fails. The result stays in
    /// memory; the file keeps its previous content.
    pub(crate) fn append_and_checkpoint(&mut self, result: ScrapeResult) -> Result<(), PersistError> {
        self.results.push(result);
        self.checkpoint()
    }

    /// Atomically replaces the output file with the current sequence.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] if staging or the final rename fails.
    pub(crate) fn checkpoint(&self) -> Result<(), PersistError> {
        write_json_atomic(&self.path, &self.results)?;
        tracing::debug!(results = self.results.len(), path = %self.path.display(), "checkpoint written");
        Ok(())
    }

    /// Reads a checkpoint file back. A missing file reads as `None`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] if the file exists but cannot be read or
    /// parsed.
    pub(crate) fn load(path: &Path) -> Result<Option<Vec<ScrapeResult>>, PersistError> {
        read_json(path)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use igscrape_core::{
        stage_json, BackendId, ErrorDescriptor, ErrorKind, ProfileRecord, RequestMode,
        ScrapeRequest,
    };

    use super::*;

    fn request(target: &str) -> ScrapeRequest {
        ScrapeRequest {
            target: target.to_owned(),
            mode: RequestMode::ProfileWithPosts,
            post_limit: 2,
            permalink: None,
            origin_metadata: BTreeMap::from([("name".to_owned(), target.to_owned())]),
        }
    }

    fn success(target: &str) -> ScrapeResult {
        ScrapeResult::success(
            request(target),
            BackendId::Mobile,
            Some(ProfileRecord {
                username: target.to_owned(),
                full_name: None,
                bio: None,
                avatar_url: None,
                follower_count: Some(10),
                following_count: Some(1),
            }),
            Vec::new(),
        )
    }

    #[test]
    fn each_checkpoint_holds_exactly_the_appended_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("results.json");
        let mut store = ResultStore::new(&path);

        let targets = ["natgeo", "nasa", "missing"];
        for (n, target) in targets.iter().enumerate() {
            let result = if *target == "missing" {
                ScrapeResult::failure(
                    request(target),
                    Some(BackendId::Web),
                    ErrorDescriptor {
                        kind: ErrorKind::NotFound,
                        message: "user not found".to_owned(),
                    },
                )
            } else {
                success(target)
            };
            store.append_and_checkpoint(result).unwrap();

            let on_disk = ResultStore::load(&path).unwrap().unwrap();
            assert_eq!(on_disk.len(), n + 1);
            assert_eq!(on_disk, store.results());
        }

        let names: Vec<_> = ResultStore::load(&path)
            .unwrap()
            .unwrap()
            .into_iter()
            .map(|r| r.request.target)
            .collect();
        assert_eq!(names, ["natgeo", "nasa", "missing"]);
    }

    #[test]
    fn output_is_a_json_array_with_null_error_for_successes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        let mut store = ResultStore::new(&path);
        store.append_and_checkpoint(success("natgeo")).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let array = raw.as_array().unwrap();
        assert_eq!(array.len(), 1);
        assert!(array[0]["error"].is_null());
        assert_eq!(array[0]["backend_used"], "mobile");
        assert_eq!(array[0]["request"]["mode"], "profile_with_posts");
    }

    #[test]
    fn interrupted_checkpoint_leaves_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        let mut store = ResultStore::new(&path);
        store.append_and_checkpoint(success("natgeo")).unwrap();

        // Stage the next state but drop it before the rename.
        let next = vec![success("natgeo"), success("nasa")];
        let staged = stage_json(&path, &next).unwrap();
        let temp = staged.temp_path().to_path_buf();
        drop(staged);

        assert!(!temp.exists());
        let on_disk = ResultStore::load(&path).unwrap().unwrap();
        assert_eq!(on_disk.len(), 1);
        assert_eq!(on_disk[0].request.target, "natgeo");
    }

    #[test]
    fn new_store_does_not_touch_existing_file_until_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(&path, "[]").unwrap();

        let mut store = ResultStore::new(&path);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");

        store.append_and_checkpoint(success("nasa")).unwrap();
        assert_eq!(ResultStore::load(&path).unwrap().unwrap().len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ResultStore::load(&dir.path().join("absent.json"))
            .unwrap()
            .is_none());
    }
}
