//! Filesystem-backed scene store

use crate::error::{Result, SceneStoreError};
use crate::locks::SceneLocks;
use crate::staging::{stage_json, Staged};
use crate::validation;
use chrono::{DateTime, TimeDelta, Utc};
use glb_stream::GlbUpload;
use scene_protocol::{Scene, SceneMetadata, ScenePatch, GLB_MIME_TYPE};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const METADATA_FILE: &str = "scene.json";
const BINARY_FILE: &str = "scene.glb";

/// Configuration for the scene store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root data directory; scenes live under `{root}/scenes`
    pub root: PathBuf,
    /// Largest binary accepted by `create` and `update`
    pub max_upload_bytes: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./data"),
            max_upload_bytes: 50 * 1024 * 1024, // 50MB
        }
    }
}

/// An open handle on a stored binary
#[derive(Debug)]
pub struct ModelFile {
    pub file: File,
    pub size: u64,
    /// Hash recorded for this binary when the handle was opened
    pub hash: String,
    pub mime_type: &'static str,
}

/// Durable (metadata, binary) pairs keyed by scene id
pub struct SceneStore {
    scenes_dir: PathBuf,
    staging_dir: PathBuf,
    max_upload_bytes: u64,
    locks: SceneLocks,
    #[cfg(test)]
    fail_metadata_commit: std::sync::atomic::AtomicBool,
}

impl SceneStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            scenes_dir: config.root.join("scenes"),
            staging_dir: config.root.join("staging"),
            max_upload_bytes: config.max_upload_bytes,
            locks: SceneLocks::default(),
            #[cfg(test)]
            fail_metadata_commit: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// Create the directory layout and clear staging left by a previous run
    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.scenes_dir)
            .await
            .map_err(SceneStoreError::io("create scenes directory", None))?;
        fs::create_dir_all(&self.staging_dir)
            .await
            .map_err(SceneStoreError::io("create staging directory", None))?;

        let mut swept = 0usize;
        let mut entries = fs::read_dir(&self.staging_dir)
            .await
            .map_err(SceneStoreError::io("read staging directory", None))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(SceneStoreError::io("read staging directory", None))?
        {
            match fs::remove_file(entry.path()).await {
                Ok(()) => swept += 1,
                Err(e) => warn!(path = ?entry.path(), error = %e, "Failed to remove stale upload"),
            }
        }

        let mut orphans = 0usize;
        let mut entries = fs::read_dir(&self.scenes_dir)
            .await
            .map_err(SceneStoreError::io("read scenes directory", None))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(SceneStoreError::io("read scenes directory", None))?
        {
            if !fs::try_exists(entry.path().join(METADATA_FILE))
                .await
                .unwrap_or(false)
            {
                warn!(path = ?entry.path(), "Scene directory has no metadata (orphaned binary?)");
                orphans += 1;
            }
        }

        info!(scenes_dir = ?self.scenes_dir, swept, orphans, "Scene store initialized");
        Ok(())
    }

    fn scene_dir(&self, id: Uuid) -> PathBuf {
        self.scenes_dir.join(id.to_string())
    }

    fn staging_file(&self) -> Staged {
        Staged::file(
            self.staging_dir
                .join(format!("{}.glb.partial", Uuid::new_v4())),
        )
    }

    /// Stream `upload` into staging, returning the staged file and its hash.
    ///
    /// Header and size checks run before the staging file is created.
    async fn stage_binary(
        &self,
        upload: GlbUpload<'_>,
        scene_id: Option<Uuid>,
    ) -> Result<(Staged, String)> {
        let validated = upload
            .validate(self.max_upload_bytes)
            .await
            .map_err(|e| SceneStoreError::from_glb(e, scene_id))?;

        let staged = self.staging_file();
        let persisted = validated
            .write_to(staged.path())
            .await
            .map_err(|e| SceneStoreError::from_glb(e, scene_id))?;

        debug!(scene_id = ?scene_id, size = persisted.size, hash = %persisted.hash, "Binary staged");
        Ok((staged, persisted.hash))
    }

    /// Create a scene from metadata and a GLB upload.
    ///
    /// Nothing is visible until `scene.json` lands, which happens only after
    /// the binary is fully written. Any failure removes what was written.
    pub async fn create(&self, metadata: SceneMetadata, upload: GlbUpload<'_>) -> Result<Scene> {
        validation::check_metadata(&metadata)?;

        let (binary, hash) = self.stage_binary(upload, None).await?;

        let id = Uuid::new_v4();
        let dir = self.scene_dir(id);
        fs::create_dir(&dir)
            .await
            .map_err(SceneStoreError::io("create scene directory", Some(id)))?;
        let scene_dir = Staged::dir(dir.clone());

        binary
            .persist(&dir.join(BINARY_FILE))
            .await
            .map_err(SceneStoreError::io("move binary into place", Some(id)))?;

        let now = Utc::now();
        let scene = Scene {
            id,
            name: metadata.name,
            description: metadata.description.unwrap_or_default(),
            created_at: now,
            updated_at: now,
            hash,
            meshes: metadata.meshes.unwrap_or_default(),
        };

        self.commit_metadata(&scene).await?;
        scene_dir.keep();

        info!(scene_id = %id, hash = %scene.hash, "Created scene");
        Ok(scene)
    }

    /// Merge `patch` into a scene and optionally replace its binary.
    ///
    /// A new binary is staged before the scene lock is taken; the old binary
    /// and record stay untouched unless the whole upload succeeds. The old
    /// binary is kept as a hard link in staging until the record lands, and
    /// is moved back if the record cannot be replaced.
    pub async fn update(
        &self,
        id: Uuid,
        patch: ScenePatch,
        upload: Option<GlbUpload<'_>>,
    ) -> Result<Scene> {
        validation::check_patch(&patch)?;

        // Fail fast before streaming a body for an unknown id
        self.read_scene(id).await?;

        let staged = match upload {
            Some(upload) => Some(self.stage_binary(upload, Some(id)).await?),
            None => None,
        };

        let _guard = self.locks.lock(id).await;
        let current = self.read_scene(id).await?;

        let new_hash = staged.as_ref().map(|(_, hash)| hash.clone());
        let updated = apply_patch(&current, patch, new_hash, Utc::now());
        let metadata = stage_json(&self.staging_dir, &updated)
            .await
            .map_err(SceneStoreError::io("stage metadata", Some(id)))?;

        let dir = self.scene_dir(id);
        let binary_path = dir.join(BINARY_FILE);
        let previous = match staged {
            Some((binary, _)) => {
                let backup = self.back_up_binary(id, &binary_path).await?;
                binary
                    .persist(&binary_path)
                    .await
                    .map_err(SceneStoreError::io("replace binary", Some(id)))?;
                Some(backup)
            }
            None => None,
        };

        if let Err(e) = self.persist_metadata(metadata, &dir.join(METADATA_FILE)).await {
            if let Some(backup) = previous {
                restore_binary(id, backup, &binary_path).await;
            }
            return Err(SceneStoreError::io("replace metadata", Some(id))(e));
        }

        info!(scene_id = %id, hash = %updated.hash, "Updated scene");
        Ok(updated)
    }

    pub async fn get(&self, id: Uuid) -> Result<Scene> {
        self.read_scene(id).await
    }

    /// Open the stored binary for streaming.
    ///
    /// The record and file are read under the scene lock, so the returned
    /// hash describes the bytes behind the handle even if an update lands
    /// while the caller is still reading.
    pub async fn get_model(&self, id: Uuid) -> Result<ModelFile> {
        let _guard = self.locks.lock(id).await;
        let scene = self.read_scene(id).await?;

        let path = self.scene_dir(id).join(BINARY_FILE);
        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(scene_id = %id, "Scene record has no binary");
                return Err(SceneStoreError::NotFound(id));
            }
            Err(e) => return Err(SceneStoreError::io("open binary", Some(id))(e)),
        };
        let size = file
            .metadata()
            .await
            .map_err(SceneStoreError::io("stat binary", Some(id)))?
            .len();

        Ok(ModelFile {
            file,
            size,
            hash: scene.hash,
            mime_type: GLB_MIME_TYPE,
        })
    }

    /// Delete a scene.
    ///
    /// Removing the record is what makes the delete succeed. If removing the
    /// binary fails afterwards it is logged and left on disk; nothing
    /// reclaims it.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let guard = self.locks.lock(id).await;
        let dir = self.scene_dir(id);

        match fs::remove_file(dir.join(METADATA_FILE)).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SceneStoreError::NotFound(id))
            }
            Err(e) => return Err(SceneStoreError::io("delete metadata", Some(id))(e)),
        }

        if let Err(e) = fs::remove_dir_all(&dir).await {
            warn!(scene_id = %id, error = %e, "Scene deleted but its binary could not be removed");
        }

        drop(guard);

        info!(scene_id = %id, "Deleted scene");
        Ok(())
    }

    /// All scenes, oldest first (ties broken by id)
    pub async fn list(&self) -> Result<Vec<Scene>> {
        let mut entries = fs::read_dir(&self.scenes_dir)
            .await
            .map_err(SceneStoreError::io("read scenes directory", None))?;

        let mut scenes = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(SceneStoreError::io("read scenes directory", None))?
        {
            let Some(id) = entry
                .file_name()
                .to_str()
                .and_then(|name| Uuid::parse_str(name).ok())
            else {
                continue;
            };

            match self.read_scene(id).await {
                Ok(scene) => scenes.push(scene),
                // Being created or deleted right now
                Err(SceneStoreError::NotFound(_)) => continue,
                Err(e) => warn!(scene_id = %id, error = %e, "Skipping unreadable scene"),
            }
        }

        scenes.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(scenes)
    }

    async fn read_scene(&self, id: Uuid) -> Result<Scene> {
        let path = self.scene_dir(id).join(METADATA_FILE);
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SceneStoreError::NotFound(id))
            }
            Err(e) => return Err(SceneStoreError::io("read metadata", Some(id))(e)),
        };
        serde_json::from_slice(&raw).map_err(|source| SceneStoreError::CorruptRecord {
            scene_id: Some(id),
            source,
        })
    }

    /// Hard-link the current binary into staging. `None` when the scene has
    /// no binary to fall back to.
    async fn back_up_binary(&self, id: Uuid, binary_path: &Path) -> Result<Option<Staged>> {
        let backup = Staged::file(
            self.staging_dir
                .join(format!("{}.glb.previous", Uuid::new_v4())),
        );
        match fs::hard_link(binary_path, backup.path()).await {
            Ok(()) => Ok(Some(backup)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                backup.keep();
                Ok(None)
            }
            Err(e) => Err(SceneStoreError::io("back up binary", Some(id))(e)),
        }
    }

    async fn persist_metadata(&self, staged: Staged, dest: &Path) -> io::Result<()> {
        #[cfg(test)]
        if self
            .fail_metadata_commit
            .load(std::sync::atomic::Ordering::SeqCst)
        {
            return Err(io::Error::other("metadata commit disabled"));
        }
        staged.persist(dest).await
    }

    async fn commit_metadata(&self, scene: &Scene) -> Result<()> {
        let staged = stage_json(&self.staging_dir, scene)
            .await
            .map_err(SceneStoreError::io("stage metadata", Some(scene.id)))?;
        staged
            .persist(&self.scene_dir(scene.id).join(METADATA_FILE))
            .await
            .map_err(SceneStoreError::io("commit metadata", Some(scene.id)))
    }

    #[cfg(test)]
    fn binary_path(&self, id: Uuid) -> PathBuf {
        self.scene_dir(id).join(BINARY_FILE)
    }

    #[cfg(test)]
    fn staging_path(&self) -> &std::path::Path {
        &self.staging_dir
    }
}

/// Put the binary that was replaced back after a failed update
async fn restore_binary(id: Uuid, backup: Option<Staged>, binary_path: &Path) {
    let result = match backup {
        Some(backup) => backup.persist(binary_path).await,
        None => fs::remove_file(binary_path).await,
    };
    match result {
        Ok(()) => warn!(scene_id = %id, "Update rolled back to the previous binary"),
        Err(e) => error!(scene_id = %id, error = %e, "Failed to roll back binary after update"),
    }
}

/// Build the next version of a scene from its current record and a patch
fn apply_patch(
    current: &Scene,
    patch: ScenePatch,
    new_hash: Option<String>,
    now: DateTime<Utc>,
) -> Scene {
    Scene {
        id: current.id,
        name: patch.name.unwrap_or_else(|| current.name.clone()),
        description: patch
            .description
            .unwrap_or_else(|| current.description.clone()),
        created_at: current.created_at,
        updated_at: next_updated_at(current.updated_at, now),
        hash: new_hash.unwrap_or_else(|| current.hash.clone()),
        meshes: patch.meshes.unwrap_or_else(|| current.meshes.clone()),
    }
}

/// `updated_at` strictly increases even if the clock does not
fn next_updated_at(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if now > previous {
        now
    } else {
        previous + TimeDelta::milliseconds(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::stream::{self, StreamExt};
    use glb_stream::sha256_hex;
    use scene_protocol::Mesh;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};
    use tokio::io::AsyncReadExt;
    use tokio::sync::oneshot;

    fn glb(body_len: usize, seed: u8) -> Vec<u8> {
        let mut data = Vec::with_capacity(12 + body_len);
        data.extend_from_slice(b"glTF");
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&((12 + body_len) as u32).to_le_bytes());
        data.extend((0..body_len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)));
        data
    }

    async fn test_store(max_upload_bytes: u64) -> (TempDir, SceneStore) {
        let dir = tempdir().unwrap();
        let store = SceneStore::new(StoreConfig {
            root: dir.path().to_path_buf(),
            max_upload_bytes,
        });
        store.init().await.unwrap();
        (dir, store)
    }

    async fn read_model(store: &SceneStore, id: Uuid) -> Vec<u8> {
        let mut model = store.get_model(id).await.unwrap();
        let mut data = Vec::new();
        model.file.read_to_end(&mut data).await.unwrap();
        data
    }

    async fn dir_len(path: &Path) -> usize {
        let mut entries = fs::read_dir(path).await.unwrap();
        let mut n = 0;
        while entries.next_entry().await.unwrap().is_some() {
            n += 1;
        }
        n
    }

    #[tokio::test]
    async fn test_create_then_get_model_round_trips() {
        let (_dir, store) = test_store(1024 * 1024).await;
        let data = glb(10_000, 1);

        let scene = store
            .create(SceneMetadata::named("Room"), GlbUpload::from_bytes(data.clone()))
            .await
            .unwrap();

        assert_eq!(scene.name, "Room");
        assert_eq!(scene.description, "");
        assert_eq!(scene.hash, sha256_hex(&data));
        assert_eq!(store.get(scene.id).await.unwrap(), scene);

        let model = store.get_model(scene.id).await.unwrap();
        assert_eq!(model.size, data.len() as u64);
        assert_eq!(model.hash, scene.hash);
        assert_eq!(model.mime_type, "model/gltf-binary");
        assert_eq!(read_model(&store, scene.id).await, data);

        assert_eq!(dir_len(store.staging_path()).await, 0);
    }

    #[tokio::test]
    async fn test_create_with_chunked_upload() {
        let (_dir, store) = test_store(1024 * 1024).await;
        let data = glb(50_000, 2);
        let chunks = data.chunks(4096).map(Bytes::copy_from_slice).collect();

        let scene = store
            .create(SceneMetadata::named("Room"), GlbUpload::from_chunks(chunks))
            .await
            .unwrap();

        assert_eq!(scene.hash, sha256_hex(&data));
        assert_eq!(read_model(&store, scene.id).await, data);
    }

    #[tokio::test]
    async fn test_bad_magic_leaves_no_trace() {
        let (dir, store) = test_store(1024 * 1024).await;
        let mut data = glb(128, 3);
        data[0] = b'X';

        let err = store
            .create(SceneMetadata::named("Room"), GlbUpload::from_bytes(data))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SceneStoreError::InvalidBinaryFormat(glb_stream::FormatViolation::BadMagic { .. })
        ));
        assert_eq!(dir_len(&dir.path().join("scenes")).await, 0);
        assert_eq!(dir_len(store.staging_path()).await, 0);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_declared_size_over_limit_writes_nothing() {
        let (dir, store) = test_store(1024).await;
        let upload = GlbUpload::from_bytes(glb(64, 4)).with_declared_size(4096);

        let err = store
            .create(SceneMetadata::named("Room"), upload)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SceneStoreError::FileTooLarge {
                limit: 1024,
                observed: 4096
            }
        ));
        assert_eq!(dir_len(&dir.path().join("scenes")).await, 0);
        assert_eq!(dir_len(store.staging_path()).await, 0);
    }

    #[tokio::test]
    async fn test_observed_size_over_limit_cleans_staging() {
        let (dir, store) = test_store(1024).await;
        let data = glb(4096, 5);
        let chunks = data.chunks(256).map(Bytes::copy_from_slice).collect();

        let err = store
            .create(SceneMetadata::named("Room"), GlbUpload::from_chunks(chunks))
            .await
            .unwrap_err();

        assert!(matches!(err, SceneStoreError::FileTooLarge { .. }));
        assert_eq!(dir_len(&dir.path().join("scenes")).await, 0);
        assert_eq!(dir_len(store.staging_path()).await, 0);
    }

    #[tokio::test]
    async fn test_invalid_metadata_rejected_before_upload() {
        let (_dir, store) = test_store(1024 * 1024).await;

        let err = store
            .create(SceneMetadata::named(""), GlbUpload::from_bytes(glb(16, 6)))
            .await
            .unwrap_err();

        assert!(matches!(err, SceneStoreError::Validation(_)));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_replaces_binary_and_hash() {
        let (_dir, store) = test_store(1024 * 1024).await;
        let first = glb(2000, 7);
        let second = glb(1000, 8);

        let created = store
            .create(SceneMetadata::named("Room"), GlbUpload::from_bytes(first))
            .await
            .unwrap();
        let updated = store
            .update(
                created.id,
                ScenePatch::default(),
                Some(GlbUpload::from_bytes(second.clone())),
            )
            .await
            .unwrap();

        assert_eq!(updated.hash, sha256_hex(&second));
        assert_ne!(updated.hash, created.hash);
        assert_eq!(updated.name, "Room");
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at > created.updated_at);
        assert_eq!(read_model(&store, created.id).await, second);
        assert_eq!(dir_len(store.staging_path()).await, 0);
    }

    #[tokio::test]
    async fn test_metadata_only_update_merges_fields() {
        let (_dir, store) = test_store(1024 * 1024).await;
        let mut meshes = scene_protocol::Meshes::new();
        meshes.insert(
            "lamp".into(),
            Mesh {
                entity_ids: vec!["light.a".into()],
            },
        );
        let created = store
            .create(
                SceneMetadata {
                    name: "Room".into(),
                    description: Some("Upstairs".into()),
                    meshes: Some(meshes.clone()),
                },
                GlbUpload::from_bytes(glb(64, 9)),
            )
            .await
            .unwrap();

        let updated = store
            .update(
                created.id,
                ScenePatch {
                    name: Some("Bedroom".into()),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Bedroom");
        assert_eq!(updated.description, "Upstairs");
        assert_eq!(updated.meshes, meshes);
        assert_eq!(updated.hash, created.hash);
        assert!(updated.updated_at > created.updated_at);
        assert_eq!(store.get(created.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_failed_update_keeps_old_state() {
        let (_dir, store) = test_store(1024 * 1024).await;
        let original = glb(512, 10);
        let created = store
            .create(SceneMetadata::named("Room"), GlbUpload::from_bytes(original.clone()))
            .await
            .unwrap();

        let chunks = vec![
            Ok(Bytes::from(glb(256, 11))),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "client went away")),
        ];
        let err = store
            .update(
                created.id,
                ScenePatch {
                    name: Some("Renamed".into()),
                    ..Default::default()
                },
                Some(GlbUpload::new(stream::iter(chunks))),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SceneStoreError::UploadInterrupted(_)));
        assert_eq!(store.get(created.id).await.unwrap(), created);
        assert_eq!(read_model(&store, created.id).await, original);
        assert_eq!(dir_len(store.staging_path()).await, 0);
    }

    #[tokio::test]
    async fn test_cancelled_update_cleans_staging() {
        let (_dir, store) = test_store(1024 * 1024).await;
        let created = store
            .create(SceneMetadata::named("Room"), GlbUpload::from_bytes(glb(64, 12)))
            .await
            .unwrap();

        let never_ends = stream::iter(vec![Ok(Bytes::from(glb(64, 13)))]).chain(stream::pending());
        let result = tokio::time::timeout(
            Duration::from_millis(50),
            store.update(
                created.id,
                ScenePatch::default(),
                Some(GlbUpload::new(never_ends)),
            ),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(dir_len(store.staging_path()).await, 0);
        assert_eq!(store.get(created.id).await.unwrap(), created);
    }

    #[tokio::test]
    async fn test_cancelled_create_leaves_nothing() {
        let (dir, store) = test_store(1024 * 1024).await;
        let never_ends = stream::iter(vec![Ok(Bytes::from(glb(64, 14)))]).chain(stream::pending());

        let result = tokio::time::timeout(
            Duration::from_millis(50),
            store.create(SceneMetadata::named("Room"), GlbUpload::new(never_ends)),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(dir_len(store.staging_path()).await, 0);
        assert_eq!(dir_len(&dir.path().join("scenes")).await, 0);
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let (_dir, store) = test_store(1024).await;
        let id = Uuid::new_v4();

        assert!(matches!(
            store.get(id).await,
            Err(SceneStoreError::NotFound(_))
        ));
        assert!(matches!(
            store.get_model(id).await,
            Err(SceneStoreError::NotFound(_))
        ));
        assert!(matches!(
            store.delete(id).await,
            Err(SceneStoreError::NotFound(_))
        ));
        assert!(matches!(
            store.update(id, ScenePatch::default(), None).await,
            Err(SceneStoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_binary_is_not_found() {
        let (_dir, store) = test_store(1024).await;
        let scene = store
            .create(SceneMetadata::named("Room"), GlbUpload::from_bytes(glb(16, 15)))
            .await
            .unwrap();
        fs::remove_file(store.binary_path(scene.id)).await.unwrap();

        assert!(matches!(
            store.get_model(scene.id).await,
            Err(SceneStoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_scene() {
        let (dir, store) = test_store(1024).await;
        let scene = store
            .create(SceneMetadata::named("Room"), GlbUpload::from_bytes(glb(16, 16)))
            .await
            .unwrap();

        store.delete(scene.id).await.unwrap();

        assert!(matches!(
            store.get(scene.id).await,
            Err(SceneStoreError::NotFound(_))
        ));
        assert_eq!(dir_len(&dir.path().join("scenes")).await, 0);
        assert_eq!(store.locks.len(), 0);
    }

    #[tokio::test]
    async fn test_unknown_ids_leave_no_locks_behind() {
        let (_dir, store) = test_store(1024).await;

        for _ in 0..200 {
            assert!(matches!(
                store.get_model(Uuid::new_v4()).await,
                Err(SceneStoreError::NotFound(_))
            ));
            assert!(matches!(
                store.delete(Uuid::new_v4()).await,
                Err(SceneStoreError::NotFound(_))
            ));
            assert!(matches!(
                store.update(Uuid::new_v4(), ScenePatch::default(), None).await,
                Err(SceneStoreError::NotFound(_))
            ));
        }

        assert_eq!(store.locks.len(), 0);
    }

    #[tokio::test]
    async fn test_failed_metadata_commit_restores_previous_binary() {
        let (_dir, store) = test_store(1024 * 1024).await;
        let original = glb(1024, 25);
        let created = store
            .create(SceneMetadata::named("Room"), GlbUpload::from_bytes(original.clone()))
            .await
            .unwrap();

        store
            .fail_metadata_commit
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let err = store
            .update(
                created.id,
                ScenePatch {
                    name: Some("Renamed".into()),
                    ..Default::default()
                },
                Some(GlbUpload::from_bytes(glb(2048, 26))),
            )
            .await
            .unwrap_err();
        store
            .fail_metadata_commit
            .store(false, std::sync::atomic::Ordering::SeqCst);

        assert!(matches!(
            err,
            SceneStoreError::StorageIo {
                op: "replace metadata",
                ..
            }
        ));
        assert_eq!(store.get(created.id).await.unwrap(), created);
        assert_eq!(store.get_model(created.id).await.unwrap().hash, created.hash);
        assert_eq!(read_model(&store, created.id).await, original);
        assert_eq!(dir_len(store.staging_path()).await, 0);
    }

    #[tokio::test]
    async fn test_delete_during_update_upload_wins() {
        let (dir, store) = test_store(1024 * 1024).await;
        let store = Arc::new(store);
        let created = store
            .create(SceneMetadata::named("Room"), GlbUpload::from_bytes(glb(64, 27)))
            .await
            .unwrap();

        // The upload stalls after its first chunk until the delete is done
        let data = glb(4096, 28);
        let head = Bytes::copy_from_slice(&data[..1024]);
        let tail = Bytes::copy_from_slice(&data[1024..]);
        let (started_tx, started_rx) = oneshot::channel();
        let (resume_tx, resume_rx) = oneshot::channel::<()>();
        let body = stream::once(async move {
            let _ = started_tx.send(());
            Ok::<_, io::Error>(head)
        })
        .chain(stream::once(async move {
            let _ = resume_rx.await;
            Ok(tail)
        }));

        let update = {
            let store = store.clone();
            let id = created.id;
            async move {
                store
                    .update(id, ScenePatch::default(), Some(GlbUpload::new(body)))
                    .await
            }
        };
        let delete = async {
            started_rx.await.unwrap();
            store.delete(created.id).await.unwrap();
            resume_tx.send(()).unwrap();
        };

        let (result, ()) = tokio::join!(update, delete);

        assert!(matches!(result, Err(SceneStoreError::NotFound(_))));
        assert!(matches!(
            store.get(created.id).await,
            Err(SceneStoreError::NotFound(_))
        ));
        assert_eq!(dir_len(&dir.path().join("scenes")).await, 0);
        assert_eq!(dir_len(store.staging_path()).await, 0);
        assert_eq!(store.locks.len(), 0);
    }

    #[tokio::test]
    async fn test_list_is_sorted_and_skips_partial_dirs() {
        let (dir, store) = test_store(1024).await;
        let a = store
            .create(SceneMetadata::named("A"), GlbUpload::from_bytes(glb(16, 17)))
            .await
            .unwrap();
        let b = store
            .create(SceneMetadata::named("B"), GlbUpload::from_bytes(glb(16, 18)))
            .await
            .unwrap();
        fs::create_dir(dir.path().join("scenes").join(Uuid::new_v4().to_string()))
            .await
            .unwrap();

        let ids: Vec<_> = store.list().await.unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
    }

    #[tokio::test]
    async fn test_list_skips_corrupt_records() {
        let (dir, store) = test_store(1024).await;
        let good = store
            .create(SceneMetadata::named("Good"), GlbUpload::from_bytes(glb(16, 19)))
            .await
            .unwrap();
        let bad_dir = dir.path().join("scenes").join(Uuid::new_v4().to_string());
        fs::create_dir(&bad_dir).await.unwrap();
        fs::write(bad_dir.join(METADATA_FILE), b"{ not json").await.unwrap();

        let scenes = store.list().await.unwrap();
        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].id, good.id);
    }

    #[tokio::test]
    async fn test_init_sweeps_stale_staging() {
        let (dir, store) = test_store(1024).await;
        fs::write(store.staging_path().join("stale.glb.partial"), b"glTF")
            .await
            .unwrap();

        let reopened = SceneStore::new(StoreConfig {
            root: dir.path().to_path_buf(),
            max_upload_bytes: 1024,
        });
        reopened.init().await.unwrap();
        assert_eq!(dir_len(reopened.staging_path()).await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_updates_keep_hash_and_binary_in_sync() {
        let (_dir, store) = test_store(4 * 1024 * 1024).await;
        let store = Arc::new(store);
        let created = store
            .create(SceneMetadata::named("Room"), GlbUpload::from_bytes(glb(64, 20)))
            .await
            .unwrap();

        let first = glb(300_000, 21);
        let second = glb(200_000, 22);
        let upload_task = |data: Vec<u8>| {
            let store = store.clone();
            let id = created.id;
            tokio::spawn(async move {
                let chunks = data.chunks(8192).map(Bytes::copy_from_slice).collect();
                store
                    .update(id, ScenePatch::default(), Some(GlbUpload::from_chunks(chunks)))
                    .await
            })
        };

        let (a, b) = tokio::join!(upload_task(first.clone()), upload_task(second.clone()));
        a.unwrap().unwrap();
        b.unwrap().unwrap();

        let scene = store.get(created.id).await.unwrap();
        let on_disk = read_model(&store, created.id).await;
        assert_eq!(scene.hash, sha256_hex(&on_disk));
        assert!(on_disk == first || on_disk == second);
    }

    #[tokio::test]
    async fn test_end_to_end_lifecycle() {
        let (_dir, store) = test_store(50 * 1024 * 1024).await;
        let ten_mib = glb(10 * 1024 * 1024 - 12, 23);
        let five_mib = glb(5 * 1024 * 1024 - 12, 24);

        let created = store
            .create(SceneMetadata::named("Room"), GlbUpload::from_bytes(ten_mib.clone()))
            .await
            .unwrap();
        assert_eq!(created.hash, sha256_hex(&ten_mib));
        assert_eq!(read_model(&store, created.id).await, ten_mib);

        let updated = store
            .update(
                created.id,
                ScenePatch::default(),
                Some(GlbUpload::from_bytes(five_mib.clone())),
            )
            .await
            .unwrap();
        assert_eq!(updated.hash, sha256_hex(&five_mib));
        assert_eq!(read_model(&store, created.id).await, five_mib);

        store.delete(created.id).await.unwrap();
        assert!(matches!(
            store.get(created.id).await,
            Err(SceneStoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_updated_at_is_monotonic() {
        let previous = Utc::now();
        let earlier = previous - TimeDelta::seconds(5);
        assert!(next_updated_at(previous, earlier) > previous);
        assert!(next_updated_at(previous, previous) > previous);

        let later = previous + TimeDelta::seconds(5);
        assert_eq!(next_updated_at(previous, later), later);
    }
}
