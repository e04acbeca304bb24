//! The mG table: precomputed multiples of the basepoint that turn the
//! bounded discrete log `mG -> m` into a table lookup.
//!
//! The table holds `(point, scalar)` records for every scalar in
//! `[0, mmax)`, sorted by the 32-byte compressed point so a decryption can
//! be resolved by interpolation search. With the default `mmax = 2^24` the
//! table is about 576 MiB, so generation and sorting are parallel and the
//! result is persisted to disk as a headerless stream of 36-byte records.

use std::cmp::Ordering;
use std::convert::TryFrom;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use curve25519_dalek::constants::ED25519_BASEPOINT_POINT;
use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::traits::Identity;
use log::{debug, info};
use rayon::prelude::*;

use crate::ecelgamal::{Cipher, PrivateKey, POINT_SIZE};
use crate::error::Error;

/// Entries read or written per I/O batch.
const IO_BATCH: usize = 1 << 10;

/// One table record: a compressed point and the scalar it is a multiple by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MGEntry {
    point: [u8; POINT_SIZE],
    scalar: u32,
}

impl MGEntry {
    /// Serialized record width: 32 point bytes followed by a little-endian
    /// u32 scalar, packed with no padding.
    pub const SIZE: usize = POINT_SIZE + 4;

    pub fn point(&self) -> &[u8; POINT_SIZE] {
        &self.point
    }

    pub fn scalar(&self) -> u32 {
        self.scalar
    }

    pub fn to_bytes(&self) -> [u8; MGEntry::SIZE] {
        let mut buf = [0u8; MGEntry::SIZE];
        buf[..POINT_SIZE].copy_from_slice(&self.point);
        buf[POINT_SIZE..].copy_from_slice(&self.scalar.to_le_bytes());
        buf
    }

    fn from_bytes(buf: &[u8]) -> Self {
        let mut point = [0u8; POINT_SIZE];
        point.copy_from_slice(&buf[..POINT_SIZE]);
        let scalar = u32::from_le_bytes([
            buf[POINT_SIZE],
            buf[POINT_SIZE + 1],
            buf[POINT_SIZE + 2],
            buf[POINT_SIZE + 3],
        ]);
        Self { point, scalar }
    }
}

/// Generate the unsorted table `[0G, 1G, .., (mmax-1)G]`.
///
/// Points are produced by addition chains rather than per-point scalar
/// multiplications: a single-threaded prepare step computes `0G..(T-1)G`
/// and the stride `TG`, then each of `T` workers extends its residue class
/// `j, j+T, j+2T, ..` by repeatedly adding the stride.
///
/// `progress` receives the running number of points computed. It may be
/// invoked from several workers at once and the reported values are not
/// monotone across invocations; the invocation reporting `mmax` happens
/// after every point is written.
pub fn generate_no_sort<F>(mmax: usize, progress: F) -> Vec<MGEntry>
where
    F: Fn(usize) + Sync,
{
    if mmax == 0 {
        return Vec::new();
    }
    let n_threads = rayon::current_num_threads().max(1).min(mmax);
    let mut entries = vec![MGEntry::default(); mmax];
    let counter = AtomicUsize::new(0);
    let report = || {
        let n = counter.fetch_add(1, AtomicOrdering::Relaxed) + 1;
        progress(n);
    };

    // Prepare: 0G .. (T-1)G, then the worker stride TG.
    let mut accumulators: Vec<EdwardsPoint> = Vec::with_capacity(n_threads);
    let mut point = EdwardsPoint::identity();
    for m in 0..n_threads {
        if m > 0 {
            point += ED25519_BASEPOINT_POINT;
        }
        entries[m] = MGEntry {
            point: point.compress().to_bytes(),
            scalar: m as u32,
        };
        accumulators.push(point);
        report();
    }
    let stride = accumulators[n_threads - 1] + ED25519_BASEPOINT_POINT;

    // Compute: worker j owns the scalars congruent to j mod T, writing them
    // into its own contiguous block of the output.
    let (_, mut tail) = entries.split_at_mut(n_threads);
    let mut blocks: Vec<&mut [MGEntry]> = Vec::with_capacity(n_threads);
    for j in 0..n_threads {
        let count = (mmax - 1 - j) / n_threads;
        let (block, rest) = std::mem::take(&mut tail).split_at_mut(count);
        blocks.push(block);
        tail = rest;
    }
    let counter_ref = &counter;
    let progress_ref = &progress;
    rayon::scope(|s| {
        for (j, block) in blocks.into_iter().enumerate() {
            let mut acc = accumulators[j];
            s.spawn(move |_| {
                for (k, entry) in block.iter_mut().enumerate() {
                    acc += stride;
                    *entry = MGEntry {
                        point: acc.compress().to_bytes(),
                        scalar: (j + (k + 1) * n_threads) as u32,
                    };
                    let n = counter_ref.fetch_add(1, AtomicOrdering::Relaxed) + 1;
                    progress_ref(n);
                }
            });
        }
    });
    entries
}

/// Sort the table by point bytes.
///
/// Two phases: every worker introsorts one contiguous range, then sorted
/// runs are pairwise merged through a scratch buffer, doubling the run
/// length per pass, until a single run remains.
pub fn sort(entries: &mut [MGEntry]) {
    let total = entries.len();
    if total <= 1 {
        return;
    }
    let n_threads = rayon::current_num_threads().max(1);
    let initial_run = divide_up(total, n_threads);
    entries
        .par_chunks_mut(initial_run)
        .for_each(|range| range.sort_unstable_by(|a, b| a.point.cmp(&b.point)));
    let mut scratch = vec![MGEntry::default(); total];
    let mut run = initial_run;
    while run < total {
        entries
            .par_chunks_mut(2 * run)
            .zip(scratch.par_chunks_mut(2 * run))
            .for_each(|(pair, scr)| {
                if pair.len() > run {
                    merge(pair, run, scr);
                }
            });
        run *= 2;
    }
}

/// Merge the sorted runs `runs[..mid]` and `runs[mid..]` through `scratch`.
fn merge(runs: &mut [MGEntry], mid: usize, scratch: &mut [MGEntry]) {
    let total = runs.len();
    {
        let (a, b) = runs.split_at(mid);
        let mut a_idx = 0;
        let mut b_idx = 0;
        for slot in scratch[..total].iter_mut() {
            let take_a = b_idx == b.len() || (a_idx < a.len() && a[a_idx].point <= b[b_idx].point);
            if take_a {
                *slot = a[a_idx];
                a_idx += 1;
            } else {
                *slot = b[b_idx];
                b_idx += 1;
            }
        }
    }
    runs.copy_from_slice(&scratch[..total]);
}

fn divide_up(a: usize, b: usize) -> usize {
    (a / b) + if a % b == 0 { 0 } else { 1 }
}

fn leading_u32(point: &[u8; POINT_SIZE]) -> u32 {
    u32::from_be_bytes([point[0], point[1], point[2], point[3]])
}

/// Look up a compressed point in a sorted table.
///
/// The leading four point bytes are close to uniform, so a linear estimate
/// of the midpoint converges in O(log log mmax) comparisons. The
/// `left >= right` early-out keeps the interpolation divisor positive for
/// degenerate windows.
pub fn interpolation_search(find: &[u8; POINT_SIZE], entries: &[MGEntry]) -> Option<u32> {
    if entries.is_empty() {
        return None;
    }
    let mut imin = 0usize;
    let mut imax = entries.len() - 1;
    let mut left = leading_u32(&entries[imin].point);
    let mut right = leading_u32(&entries[imax].point);
    let my = leading_u32(find);
    while imin <= imax {
        if left >= right {
            return None;
        }
        let imid = imin
            + ((imax - imin) as u64 * my.wrapping_sub(left) as u64 / (right - left) as u64)
                as usize;
        if imid < imin || imid > imax {
            return None;
        }
        match entries[imid].point.cmp(find) {
            Ordering::Less => {
                imin = imid + 1;
                left = leading_u32(&entries[imid].point);
            }
            Ordering::Greater => {
                if imid == 0 {
                    return None;
                }
                imax = imid - 1;
                right = leading_u32(&entries[imid].point);
            }
            Ordering::Equal => return Some(entries[imid].scalar),
        }
    }
    None
}

/// Read `mmax` records from a headerless mG file.
///
/// The file carries no magic, version, or checksum; the caller supplies the
/// expected entry count and a shorter file is an error.
pub fn load<P: AsRef<Path>>(path: P, mmax: usize) -> Result<Vec<MGEntry>, Error> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut entries = Vec::with_capacity(mmax);
    let mut buf = vec![0u8; IO_BATCH * MGEntry::SIZE];
    while entries.len() < mmax {
        let want = IO_BATCH.min(mmax - entries.len()) * MGEntry::SIZE;
        let mut filled = 0usize;
        while filled < want {
            match reader.read(&mut buf[filled..want]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        let whole = filled - filled % MGEntry::SIZE;
        for chunk in buf[..whole].chunks_exact(MGEntry::SIZE) {
            entries.push(MGEntry::from_bytes(chunk));
        }
        if filled < want {
            break;
        }
    }
    if entries.len() != mmax {
        return Err(Error::MGShortRead {
            expected: mmax,
            got: entries.len(),
        });
    }
    debug!("loaded {} mG entries", entries.len());
    Ok(entries)
}

/// Write the table as a headerless stream of 36-byte records.
pub fn save<P: AsRef<Path>>(path: P, entries: &[MGEntry]) -> Result<(), Error> {
    let mut writer = BufWriter::new(File::create(path)?);
    let mut buf = Vec::with_capacity(IO_BATCH * MGEntry::SIZE);
    for batch in entries.chunks(IO_BATCH) {
        buf.clear();
        for entry in batch {
            buf.extend_from_slice(&entry.to_bytes());
        }
        writer.write_all(&buf)?;
    }
    writer.flush()?;
    debug!("saved {} mG entries", entries.len());
    Ok(())
}

/// A sorted mG table ready for decryption.
///
/// Read-only once built; share it freely across threads.
pub struct DecryptionContext {
    entries: Vec<MGEntry>,
}

impl DecryptionContext {
    /// Generate and sort a table of `mmax` entries.
    pub fn generate(mmax: usize) -> Self {
        Self::generate_with_progress(mmax, |_| {})
    }

    /// Generate and sort, reporting per-point progress (see
    /// [`generate_no_sort`] for the callback contract).
    pub fn generate_with_progress<F>(mmax: usize, progress: F) -> Self
    where
        F: Fn(usize) + Sync,
    {
        info!("generating mG table with {} points", mmax);
        let mut entries = generate_no_sort(mmax, progress);
        sort(&mut entries);
        Self { entries }
    }

    /// Load a previously saved table.
    pub fn load_from_file<P: AsRef<Path>>(path: P, mmax: usize) -> Result<Self, Error> {
        Ok(Self {
            entries: load(path, mmax)?,
        })
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        save(path, &self.entries)
    }

    pub fn entries(&self) -> &[MGEntry] {
        &self.entries
    }

    /// The number of entries, i.e. the exclusive plaintext bound.
    pub fn mmax(&self) -> usize {
        self.entries.len()
    }

    /// Decrypt a ciphertext down to its small integer plaintext.
    ///
    /// Fails when the recovered point is not in the table: the plaintext was
    /// out of range, the key was wrong, or the ciphertext was tampered with.
    pub fn decrypt(&self, privkey: &PrivateKey, cipher: &Cipher) -> Result<u32, Error> {
        let point = privkey.decrypt_to_point(cipher)?;
        interpolation_search(point.as_bytes(), &self.entries).ok_or(Error::Decryption)
    }
}

impl TryFrom<&[u8]> for DecryptionContext {
    type Error = Error;

    /// Interpret raw bytes as a sorted table (a whole number of records).
    fn try_from(buf: &[u8]) -> Result<Self, Self::Error> {
        if buf.len() % MGEntry::SIZE != 0 {
            return Err(Error::InvalidArgument(
                "mG bytes are not a whole number of 36-byte records",
            ));
        }
        Ok(Self {
            entries: buf.chunks_exact(MGEntry::SIZE).map(MGEntry::from_bytes).collect(),
        })
    }
}
