//! Hash-validated response and noise libraries.
//!
//! Purpose
//! -------
//! Memoize [`get_response_sep_tp`] and [`get_nhl`] results in a cache
//! directory that is permanently bound to the inputs that created it.
//!
//! Key behaviors
//! -------------
//! - Opening a library: rank 0 creates `lib_dir` and writes the hash record
//!   if absent; all ranks meet at the barrier, then reload the record and
//!   compare it with the digest of their own inputs. Any difference fails
//!   with [`CacheError::HashMismatch`].
//! - Lookups compute on a miss (or when `recache` is set) and store both
//!   gradient and curl under `_G` / `_C` suffixed keys.
//! - Curl (`x…`) estimators read the `_C` entry, all others the `_G` entry.
//!
//! Invariants & assumptions
//! ------------------------
//! - Stored values are deterministic functions of the hashed inputs, so two
//!   ranks racing on the same key write identical entries.
use crate::{
    cache::{
        errors::{CacheError, CacheResult},
        hashing::{HashRecord, hash_check},
        process::ProcessGroup,
        store::{ResultStore, SqliteStore},
    },
    estimators::{
        keys::{EstimatorKey, SourceKey},
        spectra::{Filters, Spectra},
    },
    response::{GradCurl, get_nhl, get_response_sep_tp},
    transform::kernel::ConvolutionKernel,
};
use anyhow::Context;
use ndarray::Array1;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

pub const RESPONSE_HASH_FILE: &str = "resp_hash.json";
pub const NOISE_HASH_FILE: &str = "nhl_hash.json";

/// Create `lib_dir` and its hash record on rank 0, then validate on every rank.
fn bind_directory(
    lib_dir: &Path, hash_file: &str, current: &HashRecord, group: &dyn ProcessGroup,
) -> CacheResult<()> {
    let path = lib_dir.join(hash_file);
    // Rank 0 reaches the barrier even when the write fails; others then see
    // no record.
    let written = if group.rank() == 0 { write_record(lib_dir, &path, current) } else { Ok(()) };
    group.barrier()?;
    written?;
    if !path.exists() {
        return Err(CacheError::MissingHashRecord { path: path.display().to_string() });
    }
    let stored = HashRecord::load(&path)?;
    hash_check(&stored, current)?;
    debug!(path = %path.display(), rank = group.rank(), "cache hash record validated");
    Ok(())
}

fn write_record(lib_dir: &Path, path: &Path, current: &HashRecord) -> CacheResult<()> {
    fs::create_dir_all(lib_dir)
        .with_context(|| format!("cannot create library directory {}", lib_dir.display()))?;
    if !path.exists() {
        current.save(path)?;
        info!(path = %path.display(), fields = current.len(), "wrote cache hash record");
    }
    Ok(())
}

fn spectra_fields(record: &mut HashRecord, prefix: &str, cls: &Spectra) {
    for (channel, cl) in cls.iter() {
        record.insert_cl(format!("{prefix} {}", channel.as_str()), cl);
    }
}

/// Look up `key`, computing and storing both components on a miss.
fn fetch_or_compute<F>(
    store: &mut dyn ResultStore, base: &str, curl: bool, recache: bool, compute: F,
) -> CacheResult<Array1<f64>>
where
    F: FnOnce() -> CacheResult<GradCurl>,
{
    let (key_g, key_c) = (format!("{base}_G"), format!("{base}_C"));
    let key = if curl { &key_c } else { &key_g };
    let stored = store.get(key)?;
    if let (Some(value), false) = (&stored, recache) {
        debug!(key = key.as_str(), "result cache hit");
        return Ok(value.clone());
    }
    let out = compute()?;
    if stored.is_some() {
        info!(key = key.as_str(), "recomputing cached result");
        store.remove(&key_g)?;
        store.remove(&key_c)?;
    } else {
        debug!(key = key.as_str(), "result cache miss");
    }
    store.put(&key_g, &out.gradient)?;
    store.put(&key_c, &out.curl)?;
    Ok(out.select(curl).clone())
}

/// Persistent cache of estimator responses.
///
/// Governing inputs: `lmax_qe`, `lmax_qlm`, weight spectra, CMB spectra and
/// filters. Entries are keyed `qe_<label>_source_<src>_{G|C}`.
pub struct ResponseLibrary {
    lib_dir: PathBuf,
    lmax_qe: usize,
    lmax_qlm: usize,
    cls_weight: Spectra,
    cls_cmb: Spectra,
    fal: Filters,
    kernel: ConvolutionKernel,
    store: Box<dyn ResultStore>,
}

impl ResponseLibrary {
    /// Open `lib_dir` with its SQLite store.
    ///
    /// # Errors
    /// - [`CacheError::HashMismatch`] if `lib_dir` was created for other inputs.
    /// - I/O, store and serialization failures.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        lib_dir: impl AsRef<Path>, lmax_qe: usize, cls_weight: Spectra, cls_cmb: Spectra,
        fal: Filters, lmax_qlm: usize, group: &dyn ProcessGroup, kernel: ConvolutionKernel,
    ) -> CacheResult<Self> {
        let lib_dir = lib_dir.as_ref().to_path_buf();
        let record = Self::hash_record(lmax_qe, lmax_qlm, &cls_weight, &cls_cmb, &fal);
        bind_directory(&lib_dir, RESPONSE_HASH_FILE, &record, group)?;
        let store = Box::new(SqliteStore::in_dir(&lib_dir)?);
        Ok(Self { lib_dir, lmax_qe, lmax_qlm, cls_weight, cls_cmb, fal, kernel, store })
    }

    /// Like [`ResponseLibrary::open`], with an injected store.
    #[allow(clippy::too_many_arguments)]
    pub fn open_with_store(
        lib_dir: impl AsRef<Path>, lmax_qe: usize, cls_weight: Spectra, cls_cmb: Spectra,
        fal: Filters, lmax_qlm: usize, group: &dyn ProcessGroup, kernel: ConvolutionKernel,
        store: Box<dyn ResultStore>,
    ) -> CacheResult<Self> {
        let lib_dir = lib_dir.as_ref().to_path_buf();
        let record = Self::hash_record(lmax_qe, lmax_qlm, &cls_weight, &cls_cmb, &fal);
        bind_directory(&lib_dir, RESPONSE_HASH_FILE, &record, group)?;
        Ok(Self { lib_dir, lmax_qe, lmax_qlm, cls_weight, cls_cmb, fal, kernel, store })
    }

    /// Digest of the governing inputs.
    pub fn hash_record(
        lmax_qe: usize, lmax_qlm: usize, cls_weight: &Spectra, cls_cmb: &Spectra, fal: &Filters,
    ) -> HashRecord {
        let mut record = HashRecord::new();
        record.insert("lmaxqe", lmax_qe.to_string());
        record.insert("lmax_qlm", lmax_qlm.to_string());
        spectra_fields(&mut record, "clsweight", cls_weight);
        spectra_fields(&mut record, "clscmb", cls_cmb);
        for (channel, fl) in fal.iter() {
            record.insert_cl(format!("fal{}", channel.as_str()), fl);
        }
        record
    }

    pub fn lib_dir(&self) -> &Path {
        &self.lib_dir
    }

    /// Response of `key` to `source`: gradient, or curl for curl estimators.
    ///
    /// `recache` recomputes and replaces any stored entry.
    pub fn get_response(
        &mut self, key: EstimatorKey, source: SourceKey, recache: bool,
    ) -> CacheResult<Array1<f64>> {
        let base = format!("qe_{}_source_{}", key.label(), source.as_str());
        let (kernel, cls_weight, cls_cmb, fal) =
            (&self.kernel, &self.cls_weight, &self.cls_cmb, &self.fal);
        let (lmax_qe, lmax_qlm) = (self.lmax_qe, self.lmax_qlm);
        fetch_or_compute(self.store.as_mut(), &base, key.is_curl(), recache, || {
            Ok(get_response_sep_tp(
                kernel,
                key,
                lmax_qe,
                source,
                cls_weight,
                cls_cmb,
                fal,
                None,
                Some(lmax_qlm),
            )?)
        })
    }
}

impl std::fmt::Debug for ResponseLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseLibrary")
            .field("lib_dir", &self.lib_dir)
            .field("lmax_qe", &self.lmax_qe)
            .field("lmax_qlm", &self.lmax_qlm)
            .field("backend", &self.kernel.backend_name())
            .finish()
    }
}

/// Persistent cache of unnormalized analytic N0.
///
/// Governing inputs: `lmax_qe`, weight spectra and filtered-map spectra.
/// Entries are keyed `anhl_qe_<label1>_qe_<label2>_{G|C}` and cover
/// `L ≤ 2 lmax_qe`.
pub struct NoiseLibrary {
    lib_dir: PathBuf,
    lmax_qe: usize,
    cls_weight: Spectra,
    cls_ivfs: Spectra,
    kernel: ConvolutionKernel,
    store: Box<dyn ResultStore>,
}

impl NoiseLibrary {
    pub fn open(
        lib_dir: impl AsRef<Path>, lmax_qe: usize, cls_weight: Spectra, cls_ivfs: Spectra,
        group: &dyn ProcessGroup, kernel: ConvolutionKernel,
    ) -> CacheResult<Self> {
        let lib_dir = lib_dir.as_ref().to_path_buf();
        let record = Self::hash_record(lmax_qe, &cls_weight, &cls_ivfs);
        bind_directory(&lib_dir, NOISE_HASH_FILE, &record, group)?;
        let store = Box::new(SqliteStore::in_dir(&lib_dir)?);
        Ok(Self { lib_dir, lmax_qe, cls_weight, cls_ivfs, kernel, store })
    }

    pub fn open_with_store(
        lib_dir: impl AsRef<Path>, lmax_qe: usize, cls_weight: Spectra, cls_ivfs: Spectra,
        group: &dyn ProcessGroup, kernel: ConvolutionKernel, store: Box<dyn ResultStore>,
    ) -> CacheResult<Self> {
        let lib_dir = lib_dir.as_ref().to_path_buf();
        let record = Self::hash_record(lmax_qe, &cls_weight, &cls_ivfs);
        bind_directory(&lib_dir, NOISE_HASH_FILE, &record, group)?;
        Ok(Self { lib_dir, lmax_qe, cls_weight, cls_ivfs, kernel, store })
    }

    pub fn hash_record(lmax_qe: usize, cls_weight: &Spectra, cls_ivfs: &Spectra) -> HashRecord {
        let mut record = HashRecord::new();
        record.insert("lmaxqe", lmax_qe.to_string());
        spectra_fields(&mut record, "clsweight", cls_weight);
        spectra_fields(&mut record, "clsivfs", cls_ivfs);
        record
    }

    pub fn lib_dir(&self) -> &Path {
        &self.lib_dir
    }

    /// N0 of `(k1, k2)`: gradient, or curl if `k1` is a curl estimator.
    ///
    /// Estimators of different families give zeros without a store access.
    pub fn get_nhl(
        &mut self, k1: EstimatorKey, k2: EstimatorKey, recache: bool,
    ) -> CacheResult<Array1<f64>> {
        if k1.family() != k2.family() {
            return Ok(Array1::zeros(2 * self.lmax_qe + 1));
        }
        let base = format!("anhl_qe_{}_qe_{}", k1.label(), k2.label());
        let (kernel, cls_weight, cls_ivfs, lmax_qe) =
            (&self.kernel, &self.cls_weight, &self.cls_ivfs, self.lmax_qe);
        fetch_or_compute(self.store.as_mut(), &base, k1.is_curl(), recache, || {
            Ok(get_nhl(kernel, k1, k2, cls_weight, cls_ivfs, lmax_qe, None, None, None)?)
        })
    }
}

impl std::fmt::Debug for NoiseLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseLibrary")
            .field("lib_dir", &self.lib_dir)
            .field("lmax_qe", &self.lmax_qe)
            .field("backend", &self.kernel.backend_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::{
            process::{SingleProcess, ThreadGroup},
            store::MemoryStore,
        },
        estimators::spectra::{FilterChannel, SpectrumChannel},
        transform::{
            backend::TransformBackend,
            errors::{TransformError, TransformResult},
            quadrature::QuadratureRule,
        },
    };

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // - Hash record creation, validation and mismatch.
    // - Hits served without touching the kernel; recache recomputes.
    // - Key naming and gradient/curl selection.
    // -------------------------------------------------------------------------

    /// Backend that refuses every transform.
    struct Refusing;

    impl TransformBackend for Refusing {
        fn name(&self) -> &'static str {
            "refusing"
        }

        fn wigner_d(&self, _: usize, _: f64, _: i32, _: i32, out: &mut [f64]) {
            out.fill(f64::NAN);
        }

        fn quadrature_nodes(&self, _: usize) -> TransformResult<QuadratureRule> {
            Err(TransformError::BackendUnavailable {
                backend: "refusing",
                reason: "no transforms in this test".to_string(),
            })
        }
    }

    fn refusing_kernel() -> ConvolutionKernel {
        ConvolutionKernel::with_backend(Box::new(Refusing))
    }

    fn inputs(lmax: usize, tt_scale: f64) -> (Spectra, Filters) {
        let tt = Array1::from_shape_fn(lmax + 1, |l| tt_scale / (1.0 + l as f64));
        let cls = Spectra::new().with(SpectrumChannel::TT, tt);
        let fal = Filters::new().with(FilterChannel::T, Array1::from_elem(lmax + 1, 0.5));
        (cls, fal)
    }

    #[test]
    fn response_hash_record_lists_every_governing_input() {
        let (cls, fal) = inputs(4, 1.0);
        let rec = ResponseLibrary::hash_record(4, 8, &cls, &cls, &fal);
        assert_eq!(rec.get("lmaxqe"), Some("4"));
        assert_eq!(rec.get("lmax_qlm"), Some("8"));
        assert!(rec.get("clsweight tt").is_some());
        assert!(rec.get("clscmb tt").is_some());
        assert!(rec.get("falt").is_some());
        assert_eq!(rec.len(), 5);
    }

    #[test]
    // Purpose
    // -------
    // A stored entry is served by a library whose kernel cannot transform,
    // proving the hit path never recomputes; recache surfaces the failure.
    fn hits_skip_the_kernel_and_recache_recomputes() {
        let dir = tempfile::tempdir().unwrap();
        let (cls, fal) = inputs(4, 1.0);
        let mut store = MemoryStore::new();
        store.put("qe_tt_source_p_G", &Array1::from_elem(9, 7.0)).unwrap();
        let mut lib = ResponseLibrary::open_with_store(
            dir.path(),
            4,
            cls.clone(),
            cls.clone(),
            fal,
            8,
            &SingleProcess,
            refusing_kernel(),
            Box::new(store),
        )
        .unwrap();
        assert!(dir.path().join(RESPONSE_HASH_FILE).exists());

        let g = lib.get_response(EstimatorKey::Ptt, SourceKey::Lensing, false).unwrap();
        assert_eq!(g, Array1::from_elem(9, 7.0));
        assert!(matches!(
            lib.get_response(EstimatorKey::Ptt, SourceKey::Lensing, true),
            Err(CacheError::Estimator(_))
        ));
        assert!(matches!(
            lib.get_response(EstimatorKey::Xtt, SourceKey::Lensing, false),
            Err(CacheError::Estimator(_))
        ));
    }

    #[test]
    fn miss_stores_both_components() {
        let dir = tempfile::tempdir().unwrap();
        let (cls, fal) = inputs(4, 1.0);
        let mut lib = ResponseLibrary::open(
            dir.path(),
            4,
            cls.clone(),
            cls.clone(),
            fal,
            8,
            &SingleProcess,
            ConvolutionKernel::default(),
        )
        .unwrap();
        let g = lib.get_response(EstimatorKey::Ptt, SourceKey::Lensing, false).unwrap();
        assert_eq!(g.len(), 9);
        let store = SqliteStore::in_dir(dir.path()).unwrap();
        assert_eq!(store.get("qe_tt_source_p_G").unwrap(), Some(g));
        let c = store.get("qe_tt_source_p_C").unwrap().unwrap();
        assert_eq!(lib.get_response(EstimatorKey::Xtt, SourceKey::Lensing, false).unwrap(), c);
    }

    #[test]
    fn reopening_with_other_inputs_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let (cls, fal) = inputs(4, 1.0);
        let open = |lmax, ivfs: Spectra| {
            let kernel = refusing_kernel();
            NoiseLibrary::open(dir.path(), lmax, cls.clone(), ivfs, &SingleProcess, kernel)
        };
        open(4, cls.clone()).unwrap();
        let (other, _) = inputs(4, 1.5);
        let err = open(4, other).unwrap_err();
        assert!(matches!(err, CacheError::HashMismatch { ref field, .. } if field == "clsivfs tt"));
        let err = open(5, cls.clone()).unwrap_err();
        assert!(matches!(err, CacheError::HashMismatch { ref field, .. } if field == "lmaxqe"));
        // Response and noise records live side by side.
        assert!(ResponseLibrary::open(
            dir.path(),
            4,
            inputs(4, 1.0).0,
            inputs(4, 1.0).0,
            fal,
            8,
            &SingleProcess,
            refusing_kernel(),
        )
        .is_ok());
    }

    #[test]
    fn noise_family_mismatch_is_zero_without_store_access() {
        let dir = tempfile::tempdir().unwrap();
        let (cls, _) = inputs(3, 1.0);
        let mut lib = NoiseLibrary::open_with_store(
            dir.path(),
            3,
            cls.clone(),
            cls,
            &SingleProcess,
            refusing_kernel(),
            Box::new(MemoryStore::new()),
        )
        .unwrap();
        let n = lib.get_nhl(EstimatorKey::Ptt, EstimatorKey::Xtt, false).unwrap();
        assert_eq!(n, Array1::<f64>::zeros(7));
    }

    #[test]
    // Purpose
    // -------
    // Ranks of one group share a directory: rank 0 writes the record and
    // every rank validates it after the barrier.
    fn thread_group_ranks_share_one_record() {
        let dir = tempfile::tempdir().unwrap();
        let lib_dir = dir.path().join("nested").join("nhl");
        let handles: Vec<_> = ThreadGroup::split(3)
            .into_iter()
            .map(|group| {
                let lib_dir = lib_dir.clone();
                std::thread::spawn(move || {
                    let (cls, _) = inputs(3, 1.0);
                    NoiseLibrary::open_with_store(
                        &lib_dir,
                        3,
                        cls.clone(),
                        cls,
                        &group,
                        refusing_kernel(),
                        Box::new(MemoryStore::new()),
                    )
                    .map(|_| ())
                })
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap().is_ok());
        }
        assert!(lib_dir.join(NOISE_HASH_FILE).exists());
    }

    #[test]
    // Purpose
    // -------
    // A failed directory creation on rank 0 must not strand the other ranks
    // at the barrier.
    //
    // Given
    // -----
    // - Two thread ranks; `lib_dir` below a regular file.
    //
    // Expect
    // ------
    // - Both ranks return: rank 0 with the directory-creation failure, rank 1
    //   with a missing hash record.
    fn failed_record_write_releases_every_rank() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let lib_dir = blocker.join("lib");
        let (tx, rx) = std::sync::mpsc::channel();
        for group in ThreadGroup::split(2) {
            let (lib_dir, tx) = (lib_dir.clone(), tx.clone());
            std::thread::spawn(move || {
                let (cls, _) = inputs(3, 1.0);
                let res = NoiseLibrary::open_with_store(
                    &lib_dir,
                    3,
                    cls.clone(),
                    cls,
                    &group,
                    refusing_kernel(),
                    Box::new(MemoryStore::new()),
                )
                .map(|_| ());
                tx.send((group.rank(), res)).unwrap();
            });
        }
        drop(tx);
        let mut results: Vec<_> = (0..2)
            .map(|_| rx.recv_timeout(std::time::Duration::from_secs(10)).unwrap())
            .collect();
        results.sort_by_key(|(rank, _)| *rank);
        assert!(matches!(
            &results[0],
            (0, Err(CacheError::Anyhow(msg))) if msg.contains("cannot create library directory")
        ));
        assert!(matches!(results[1], (1, Err(CacheError::MissingHashRecord { .. }))));
    }

    #[test]
    fn non_root_rank_without_record_fails() {
        struct LateRank;
        impl ProcessGroup for LateRank {
            fn rank(&self) -> usize {
                1
            }
            fn size(&self) -> usize {
                2
            }
            fn barrier(&self) -> CacheResult<()> {
                Ok(())
            }
        }
        let dir = tempfile::tempdir().unwrap();
        let (cls, _) = inputs(3, 1.0);
        assert!(matches!(
            NoiseLibrary::open(dir.path(), 3, cls.clone(), cls, &LateRank, refusing_kernel()),
            Err(CacheError::MissingHashRecord { .. })
        ));
    }
}
