//! File payload I/O over a cluster chain.

use crate::container::Container;
use crate::dir::DirEntry;
use crate::error::{FsError, FsResult};
use crate::fat;
use crate::store::ClusterStore;

/// Read a file's full contents: walk the chain emitting up to one cluster
/// per hop until `size` bytes are out. A chain that ends early signals
/// `TruncatedFile`.
pub fn read<C: Container>(store: &mut ClusterStore<C>, entry: &DirEntry) -> FsResult<Vec<u8>> {
    let cluster_size = store.geometry().cluster_size as usize;
    let total = store.geometry().total_clusters;
    let mut out = Vec::with_capacity(entry.size as usize);
    let mut remaining = entry.size as usize;
    let mut cluster = Some(entry.start_cluster);
    let mut hops = 0u32;
    while remaining > 0 {
        let Some(cur) = cluster else {
            return Err(FsError::TruncatedFile);
        };
        hops += 1;
        if hops > total {
            return Err(FsError::Corrupted("file chain does not terminate"));
        }
        let chunk = remaining.min(cluster_size);
        let mut buf = vec![0u8; chunk];
        store.read_payload(cur, 0, &mut buf)?;
        out.extend_from_slice(&buf);
        remaining -= chunk;
        cluster = fat::next_in_chain(store, cur)?;
    }
    Ok(out)
}

/// What an append actually did. `written` bytes were committed either way;
/// `out_of_space` marks an allocation failure mid-write.
pub struct AppendOutcome {
    pub written: usize,
    pub out_of_space: bool,
}

/// Write `data` starting at the current end of file, allocating new
/// clusters as each one fills. Content written before an allocation failure
/// is retained — the caller folds `written` back into the entry's size in
/// every case.
pub fn append<C: Container>(
    store: &mut ClusterStore<C>,
    start_cluster: u32,
    size: u32,
    data: &[u8],
) -> FsResult<AppendOutcome> {
    let cluster_size = store.geometry().cluster_size;
    // Hop to the cluster holding the end of file. A size landing exactly on
    // a cluster boundary stays on the last existing cluster with
    // `offset == cluster_size`, so the first loop turn allocates.
    let (hops, mut offset) = match size {
        0 => (0, 0),
        n => ((n - 1) / cluster_size, ((n - 1) % cluster_size) + 1),
    };
    let mut cluster = start_cluster;
    for _ in 0..hops {
        cluster = fat::next_in_chain(store, cluster)?.ok_or(FsError::TruncatedFile)?;
    }

    let mut written = 0usize;
    let mut rest = data;
    while !rest.is_empty() {
        if offset == cluster_size {
            match fat::allocate(store, Some(cluster)) {
                Ok(fresh) => {
                    cluster = fresh;
                    offset = 0;
                }
                Err(FsError::OutOfSpace) => {
                    return Ok(AppendOutcome {
                        written,
                        out_of_space: true,
                    });
                }
                Err(e) => return Err(e),
            }
        }
        let chunk = rest.len().min((cluster_size - offset) as usize);
        store.write_payload(cluster, offset, &rest[..chunk])?;
        written += chunk;
        rest = &rest[chunk..];
        offset += chunk as u32;
    }
    Ok(AppendOutcome {
        written,
        out_of_space: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::MemContainer;
    use crate::layout::Geometry;

    fn store_with_file(clusters: u32, cluster_size: u32) -> (ClusterStore<MemContainer>, u32) {
        let len = u64::from(clusters) * u64::from(cluster_size);
        let geo = Geometry::compute(len, cluster_size).unwrap();
        let mut store = ClusterStore::new(MemContainer::new(len as usize), geo);
        let head = fat::allocate(&mut store, None).unwrap();
        (store, head)
    }

    fn entry(head: u32, size: u32) -> DirEntry {
        DirEntry {
            name: "f".to_owned(),
            is_dir: false,
            start_cluster: head,
            size,
        }
    }

    #[test]
    fn append_then_read_within_one_cluster() {
        let (mut store, head) = store_with_file(64, 512);
        let outcome = append(&mut store, head, 0, b"hello").unwrap();
        assert_eq!(outcome.written, 5);
        assert!(!outcome.out_of_space);
        assert_eq!(read(&mut store, &entry(head, 5)).unwrap(), b"hello");
    }

    #[test]
    fn read_of_empty_file_is_empty() {
        let (mut store, head) = store_with_file(64, 512);
        assert!(read(&mut store, &entry(head, 0)).unwrap().is_empty());
    }

    #[test]
    fn append_spans_clusters() {
        let (mut store, head) = store_with_file(64, 512);
        let data: Vec<u8> = (0..1300u32).map(|i| i as u8).collect();
        let outcome = append(&mut store, head, 0, &data).unwrap();
        assert_eq!(outcome.written, data.len());
        assert_eq!(read(&mut store, &entry(head, 1300)).unwrap(), data);
    }

    #[test]
    fn append_resumes_mid_cluster() {
        let (mut store, head) = store_with_file(64, 512);
        append(&mut store, head, 0, b"abc").unwrap();
        append(&mut store, head, 3, b"def").unwrap();
        assert_eq!(read(&mut store, &entry(head, 6)).unwrap(), b"abcdef");
    }

    #[test]
    fn append_at_exact_cluster_boundary() {
        let (mut store, head) = store_with_file(64, 512);
        let fill = vec![7u8; 512];
        append(&mut store, head, 0, &fill).unwrap();
        // EOF sits exactly on the boundary; the next byte must land in a
        // freshly allocated cluster.
        let outcome = append(&mut store, head, 512, b"x").unwrap();
        assert_eq!(outcome.written, 1);
        let all = read(&mut store, &entry(head, 513)).unwrap();
        assert_eq!(all.len(), 513);
        assert_eq!(all[512], b'x');
    }

    #[test]
    fn partial_append_when_space_runs_out() {
        // 6 data clusters of 64 bytes; one is the file head, so capacity is
        // 6 * 64 = 384 bytes and only 5 more clusters can be claimed.
        let (mut store, head) = store_with_file(8, 64);
        let data = vec![1u8; 500];
        let outcome = append(&mut store, head, 0, &data).unwrap();
        assert!(outcome.out_of_space);
        assert_eq!(outcome.written, 384);
        let kept = read(&mut store, &entry(head, 384)).unwrap();
        assert_eq!(kept, vec![1u8; 384]);
    }

    #[test]
    fn read_truncated_chain_fails() {
        let (mut store, head) = store_with_file(64, 512);
        append(&mut store, head, 0, b"data").unwrap();
        // Size says more bytes than the chain holds.
        assert!(matches!(
            read(&mut store, &entry(head, 600)),
            Err(FsError::TruncatedFile)
        ));
    }
}
