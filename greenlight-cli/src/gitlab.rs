//! GitLab REST v4 snapshot provider.

use greenlight_core::{
    Catalog, FileEntry, GreenlightError, MetadataValue, PathInterests, Result, Snapshot,
    SnapshotProvider, TargetKind, normalize_path,
};
use reqwest::blocking::{Client, Response};
use serde::Deserialize;

/// Snapshot provider backed by the GitLab REST API.
///
/// The client resolves exactly the paths the catalog's rules consume and
/// records a file-index entry only for paths it actually attempted; a failed
/// request leaves the corresponding entries (or metadata keys) absent so the
/// engine reports them as unknown rather than missing.
#[derive(Debug, Clone)]
pub struct GitLabApiClient {
    base_url: String,
    token: Option<String>,
    client: Client,
    project_paths: PathInterests,
    profile_paths: PathInterests,
}

#[derive(Debug, Clone, Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

impl TreeEntry {
    fn is_blob(&self) -> bool {
        self.kind == "blob"
    }
}

impl GitLabApiClient {
    /// Build a client for a GitLab instance; path resolution follows the
    /// catalog's paths of interest.
    pub fn new(base_url: impl Into<String>, token: Option<String>, catalog: &Catalog) -> Self {
        Self {
            base_url: base_url.into(),
            token,
            client: Client::new(),
            project_paths: catalog.paths_of_interest(TargetKind::Project),
            profile_paths: catalog.paths_of_interest(TargetKind::UserProfile),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/v4/{path}", self.base_url.trim_end_matches('/'))
    }

    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<Response> {
        let mut request = self.client.get(url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = &self.token {
            request = request.header("PRIVATE-TOKEN", token);
        }
        request
            .send()
            .map_err(|err| GreenlightError::Provider(format!("gitlab request failed: {err}")))
    }

    fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<serde_json::Value> {
        match self.get_json_opt(url, query)? {
            Some(value) => Ok(value),
            None => Err(GreenlightError::Provider(format!(
                "gitlab resource not found: {url}"
            ))),
        }
    }

    /// `Ok(None)` on 404; `Err` on transport failures and other API errors.
    fn get_json_opt(&self, url: &str, query: &[(&str, &str)]) -> Result<Option<serde_json::Value>> {
        let response = self.get(url, query)?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(GreenlightError::Provider(format!(
                "gitlab api error ({status}): {body}"
            )));
        }
        response.json().map(Some).map_err(|err| {
            GreenlightError::Provider(format!("gitlab response decode failed: {err}"))
        })
    }

    fn list_tree(
        &self,
        project_id: i64,
        branch: &str,
        dir: Option<&str>,
    ) -> Result<Option<Vec<TreeEntry>>> {
        let url = self.api_url(&format!("projects/{project_id}/repository/tree"));
        let mut query = vec![("ref", branch), ("per_page", "100")];
        if let Some(dir) = dir {
            query.push(("path", dir));
        }
        let Some(value) = self.get_json_opt(&url, &query)? else {
            return Ok(None);
        };
        let entries: Vec<TreeEntry> = serde_json::from_value(value).map_err(|err| {
            GreenlightError::Provider(format!("gitlab response decode failed: {err}"))
        })?;
        Ok(Some(entries))
    }

    fn fetch_raw(&self, project_id: i64, path: &str, branch: &str) -> Option<String> {
        let encoded = urlencoding::encode(path);
        let url = self.api_url(&format!("projects/{project_id}/repository/files/{encoded}/raw"));
        match self.get(&url, &[("ref", branch)]) {
            Ok(response) if response.status().is_success() => response.text().ok(),
            Ok(response) => {
                log::warn!("content fetch for {path} returned {}", response.status());
                None
            }
            Err(err) => {
                log::warn!("content fetch for {path} failed: {err}");
                None
            }
        }
    }

    fn record_tree_paths(
        &self,
        snapshot: &mut Snapshot,
        interests: &PathInterests,
        tree: &[TreeEntry],
        project_id: i64,
        branch: &str,
    ) {
        for (candidate, resolved) in resolve_candidates(&interests.files, tree) {
            let entry = if resolved.is_some() {
                FileEntry::present()
            } else {
                FileEntry::absent()
            };
            snapshot.file_index.insert(candidate, entry);
        }
        for (candidate, resolved) in resolve_candidates(&interests.contents, tree) {
            let Some(actual) = resolved else {
                snapshot.file_index.insert(candidate, FileEntry::absent());
                continue;
            };
            let entry = match self.fetch_raw(project_id, &actual, branch) {
                Some(text) => {
                    if is_readme_file(&candidate) {
                        snapshot.readme_text = Some(text.clone());
                    }
                    FileEntry::with_content(text)
                }
                None => FileEntry::present(),
            };
            snapshot.file_index.insert(candidate, entry);
        }
    }

    fn record_template_dir(
        &self,
        snapshot: &mut Snapshot,
        project_id: i64,
        branch: &str,
        dir: &str,
    ) {
        let dir_key = normalize_path(dir);
        match self.list_tree(project_id, branch, Some(dir)) {
            Ok(Some(entries)) if !entries.is_empty() => {
                snapshot.file_index.insert(dir_key, FileEntry::present());
                for entry in entries {
                    if entry.is_blob() && entry.path.to_ascii_lowercase().ends_with(".md") {
                        snapshot
                            .file_index
                            .insert(normalize_path(&entry.path), FileEntry::present());
                    }
                }
            }
            Ok(_) => {
                snapshot.file_index.insert(dir_key, FileEntry::absent());
            }
            Err(err) => log::warn!("template directory {dir} unavailable: {err}"),
        }
    }

    fn fetch_project_snapshot(&self, target_ref: &str) -> Result<Snapshot> {
        let reference = extract_path_from_url(target_ref);
        let url = self.api_url(&format!("projects/{}", encode_project_ref(&reference)));
        let Some(project) = self.get_json_opt(&url, &[])? else {
            return Err(GreenlightError::Provider(format!(
                "project not found or inaccessible: {reference}"
            )));
        };

        let target = project
            .get("path_with_namespace")
            .and_then(|value| value.as_str())
            .unwrap_or(&reference)
            .to_string();
        let mut snapshot = Snapshot::new(TargetKind::Project, target);

        let project_id = project
            .get("id")
            .and_then(|value| value.as_i64())
            .ok_or_else(|| {
                GreenlightError::Provider("gitlab response missing project id".to_string())
            })?;

        let description = project
            .get("description")
            .and_then(|value| value.as_str())
            .unwrap_or("");
        snapshot.metadata.insert(
            "description".to_string(),
            MetadataValue::Text(description.to_string()),
        );
        let branch = project
            .get("default_branch")
            .and_then(|value| value.as_str())
            .unwrap_or("main")
            .to_string();
        snapshot.metadata.insert(
            "default_branch".to_string(),
            MetadataValue::Text(branch.clone()),
        );
        if let Some(visibility) = project.get("visibility").and_then(|value| value.as_str()) {
            snapshot.metadata.insert(
                "visibility".to_string(),
                MetadataValue::Text(visibility.to_string()),
            );
        }

        match self.list_tree(project_id, &branch, None) {
            Ok(Some(tree)) => {
                self.record_tree_paths(&mut snapshot, &self.project_paths, &tree, project_id, &branch);
            }
            // Empty repository or missing branch: every candidate is absent.
            Ok(None) => {
                self.record_tree_paths(&mut snapshot, &self.project_paths, &[], project_id, &branch);
            }
            Err(err) => log::warn!(
                "repository tree for {} unavailable: {err}",
                snapshot.target_ref
            ),
        }

        for dir in &self.project_paths.template_dirs {
            self.record_template_dir(&mut snapshot, project_id, &branch, dir);
        }

        let tags_url = self.api_url(&format!("projects/{project_id}/repository/tags"));
        match self.get_json(&tags_url, &[("per_page", "1")]) {
            Ok(serde_json::Value::Array(tags)) => {
                snapshot.metadata.insert(
                    "tag_count".to_string(),
                    MetadataValue::Int(tags.len() as i64),
                );
            }
            Ok(_) => log::warn!("unexpected tags payload for {}", snapshot.target_ref),
            Err(err) => log::warn!("tags for {} unavailable: {err}", snapshot.target_ref),
        }

        Ok(snapshot)
    }

    fn fetch_user_snapshot(&self, target_ref: &str) -> Result<Snapshot> {
        let user = self.resolve_user(target_ref.trim())?;
        let username = user
            .get("username")
            .and_then(|value| value.as_str())
            .ok_or_else(|| {
                GreenlightError::Provider("gitlab response missing username".to_string())
            })?
            .to_string();

        let mut snapshot = Snapshot::new(TargetKind::UserProfile, username.clone());
        snapshot.metadata.insert(
            "username".to_string(),
            MetadataValue::Text(username.clone()),
        );
        if let Some(name) = user.get("name").and_then(|value| value.as_str()) {
            snapshot
                .metadata
                .insert("name".to_string(), MetadataValue::Text(name.to_string()));
        }

        // The profile README lives in a project named after the username.
        let profile_path = format!("{username}/{}", username.to_lowercase());
        let url = self.api_url(&format!("projects/{}", encode_project_ref(&profile_path)));
        let Some(project) = self.get_json_opt(&url, &[])? else {
            for path in self
                .profile_paths
                .files
                .iter()
                .chain(&self.profile_paths.contents)
            {
                snapshot
                    .file_index
                    .insert(normalize_path(path), FileEntry::absent());
            }
            return Ok(snapshot);
        };

        let project_id = project
            .get("id")
            .and_then(|value| value.as_i64())
            .ok_or_else(|| {
                GreenlightError::Provider("gitlab response missing project id".to_string())
            })?;
        let branch = project
            .get("default_branch")
            .and_then(|value| value.as_str())
            .unwrap_or("main")
            .to_string();

        match self.list_tree(project_id, &branch, None) {
            Ok(Some(tree)) => {
                self.record_tree_paths(&mut snapshot, &self.profile_paths, &tree, project_id, &branch);
            }
            Ok(None) => {
                self.record_tree_paths(&mut snapshot, &self.profile_paths, &[], project_id, &branch);
            }
            Err(err) => log::warn!("repository tree for {profile_path} unavailable: {err}"),
        }

        for dir in &self.profile_paths.template_dirs {
            self.record_template_dir(&mut snapshot, project_id, &branch, dir);
        }

        Ok(snapshot)
    }

    fn resolve_user(&self, reference: &str) -> Result<serde_json::Value> {
        if is_numeric_ref(reference) {
            return self.get_json(&self.api_url(&format!("users/{reference}")), &[]);
        }
        if let Some(user) = self.lookup_username(reference)? {
            return Ok(user);
        }
        let extracted = extract_path_from_url(reference);
        if extracted != reference {
            if let Some(user) = self.lookup_username(&extracted)? {
                return Ok(user);
            }
        }
        Err(GreenlightError::Provider(format!(
            "user not found: {reference}"
        )))
    }

    fn lookup_username(&self, username: &str) -> Result<Option<serde_json::Value>> {
        let value = self.get_json(&self.api_url("users"), &[("username", username)])?;
        let Some(users) = value.as_array() else {
            return Ok(None);
        };
        Ok(users.first().cloned())
    }
}

impl SnapshotProvider for GitLabApiClient {
    fn fetch_snapshot(&self, target_kind: TargetKind, target_ref: &str) -> Result<Snapshot> {
        match target_kind {
            TargetKind::Project => self.fetch_project_snapshot(target_ref),
            TargetKind::UserProfile => self.fetch_user_snapshot(target_ref),
        }
    }
}

/// Reduce a project/user URL to its path, or return the input unchanged.
pub fn extract_path_from_url(input: &str) -> String {
    let trimmed = input.trim();
    let path = match trimmed.split_once("://") {
        Some((_, rest)) => rest.split_once('/').map(|(_, path)| path).unwrap_or(""),
        None => trimmed,
    };
    let path = path.trim_matches('/');
    path.strip_suffix(".git").unwrap_or(path).to_string()
}

fn encode_project_ref(reference: &str) -> String {
    if is_numeric_ref(reference) {
        reference.to_string()
    } else {
        urlencoding::encode(reference).into_owned()
    }
}

fn is_numeric_ref(reference: &str) -> bool {
    !reference.is_empty() && reference.chars().all(|ch| ch.is_ascii_digit())
}

fn is_readme_file(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path).to_ascii_lowercase();
    name == "readme" || name.starts_with("readme.")
}

/// Pair each candidate path with the tree path that matched it, if any.
fn resolve_candidates(candidates: &[String], tree: &[TreeEntry]) -> Vec<(String, Option<String>)> {
    candidates
        .iter()
        .map(|candidate| {
            let normalized = normalize_path(candidate);
            let resolved = tree
                .iter()
                .find(|entry| entry.is_blob() && entry.path.eq_ignore_ascii_case(&normalized))
                .map(|entry| entry.path.clone());
            (normalized, resolved)
        })
        .collect()
}
