use std::time::{Duration, SystemTime};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use futures::future::BoxFuture;
use tokio::fs;

use crate::stubs::memory::Stub;

#[derive(Debug, Copy, Clone)]
pub enum Entry {
    Dir {
        /// Name of the folder
        name: &'static str,
        /// Entries of the folder
        entries: &'static [Entry],
    },
    File {
        /// Name of the file
        name: &'static str,
        /// Content of the file
        content: &'static str,
        /// Age of the file in seconds
        age: u32,
    },
}

#[rustfmt::skip]
pub const LOCAL: &[Entry] = &[
    Entry::File{name: "only-local.pdf", content: "only-local.pdf", age: 3600},
    Entry::File{name: "both-same.pdf", content: "both-same.pdf", age: 3600},
    Entry::File{name: "newer-local.pdf", content: "newer-local.pdf - local", age: 10},
    Entry::File{name: "newer-remote.pdf", content: "newer-remote.pdf - local", age: 3600},
    Entry::File{name: "clash", content: "clash - local file", age: 3600},
    Entry::Dir{name: "only-local", entries: &[
        Entry::File{name: "a.pdf", content: "only-local/a.pdf", age: 3600},
        Entry::Dir{name: "deep", entries: &[
            Entry::File{name: "b.pdf", content: "only-local/deep/b.pdf", age: 3600},
        ]},
    ]},
    Entry::Dir{name: "shared", entries: &[
        Entry::File{name: "local-only.pdf", content: "shared/local-only.pdf", age: 3600},
    ]},
];

#[rustfmt::skip]
pub const REMOTE: &[Entry] = &[
    Entry::File{name: "only-remote.pdf", content: "only-remote.pdf", age: 3600},
    Entry::File{name: "both-same.pdf", content: "both-same.pdf", age: 3600},
    Entry::File{name: "newer-local.pdf", content: "newer-local.pdf - remote", age: 3600},
    Entry::File{name: "newer-remote.pdf", content: "newer-remote.pdf - remote", age: 10},
    Entry::Dir{name: "clash", entries: &[]},
    Entry::Dir{name: "only-remote", entries: &[
        Entry::File{name: "c.pdf", content: "only-remote/c.pdf", age: 3600},
    ]},
    Entry::Dir{name: "shared", entries: &[
        Entry::File{name: "remote-only.pdf", content: "shared/remote-only.pdf", age: 3600},
    ]},
];

#[derive(Debug, Clone, Copy)]
pub struct Dataset {
    pub local: &'static [Entry],
    pub remote: &'static [Entry],
}

impl Default for Dataset {
    fn default() -> Self {
        Dataset {
            local: LOCAL,
            remote: REMOTE,
        }
    }
}

impl Dataset {
    pub fn empty() -> Self {
        Dataset {
            local: &[],
            remote: &[],
        }
    }

    pub fn local_only(local: &'static [Entry]) -> Self {
        Dataset { local, remote: &[] }
    }

    pub fn remote_only(remote: &'static [Entry]) -> Self {
        Dataset { local: &[], remote }
    }

    pub async fn create_local(&self, root: &Utf8Path) {
        create_local_level(root.to_owned(), self.local).await;
    }

    pub fn create_remote(&self, stub: &Stub) {
        create_remote_level(stub, Utf8PathBuf::new(), self.remote);
    }
}

fn create_local_level(dir: Utf8PathBuf, entries: &'static [Entry]) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        for entry in entries {
            match entry {
                Entry::Dir { name, entries } => {
                    let sub = dir.join(name);
                    fs::create_dir(&sub).await.unwrap();
                    create_local_level(sub, entries).await;
                }
                Entry::File { name, content, age } => {
                    let path = dir.join(name);
                    fs::write(&path, content).await.unwrap();
                    let mtime = SystemTime::now() - Duration::from_secs(*age as u64);
                    let file = std::fs::File::options().write(true).open(&path).unwrap();
                    file.set_modified(mtime).unwrap();
                }
            }
        }
    })
}

fn create_remote_level(stub: &Stub, dir: Utf8PathBuf, entries: &'static [Entry]) {
    for entry in entries {
        match entry {
            Entry::Dir { name, entries } => {
                let sub = dir.join(name);
                stub.insert_folder(sub.as_str());
                create_remote_level(stub, sub, entries);
            }
            Entry::File { name, content, age } => {
                let path = dir.join(name);
                let mtime = Utc::now() - chrono::Duration::seconds(*age as i64);
                stub.insert_doc(path.as_str(), content, mtime);
            }
        }
    }
}
