//! A small in-process model of sysfs.
//!
//! Directories belong to kobjects and files to attributes. Reads and writes
//! go through [`Sysfs::read`] and [`Sysfs::write`], which apply the same mode
//! checks and `PAGE_SIZE` clamping the VFS does before a `show`/`store`
//! callback is reached.

use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// Where sysfs is mounted. Absolute paths are accepted with this prefix.
pub const SYSFS_MOUNT: &str = "/sys";

/// The `/sys/kernel` directory, parent of module kobjects.
pub const KERNEL_KOBJ: &str = "kernel";

/// Largest buffer a single show or store may see.
pub const PAGE_SIZE: usize = 4096;

/// Callbacks behind one attribute file.
pub trait AttributeOps: Send + Sync {
    /// Renders the attribute into `buf`.
    fn show(&self, buf: &mut String) -> Result<()>;

    /// Consumes a write and returns how many bytes were used.
    fn store(&self, buf: &[u8]) -> Result<usize>;
}

#[derive(Clone)]
pub struct Attribute {
    name: &'static str,
    mode: u16,
    ops: Arc<dyn AttributeOps>,
}

impl Attribute {
    pub fn new(name: &'static str, mode: u16, ops: Arc<dyn AttributeOps>) -> Self {
        Self { name, mode, ops }
    }

    pub fn mode(&self) -> u16 {
        self.mode
    }
}

/// Attributes created and removed together.
///
/// An unnamed group puts its files directly in the kobject directory.
#[derive(Clone, Default)]
pub struct AttributeGroup {
    pub name: Option<&'static str>,
    pub attrs: Vec<Attribute>,
}

/// Who is performing a file operation, for the mode check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accessor {
    /// The owner of the file (root for everything in sysfs).
    Owner,
    Other,
}

/// One-shot failures, used to walk the error paths of module init.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    KObjectAlloc,
    CreateGroup,
}

#[derive(Default)]
struct Tree {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, Attribute>,
    faults: Vec<Fault>,
}

impl Tree {
    fn take_fault(&mut self, fault: Fault) -> bool {
        match self.faults.iter().position(|f| *f == fault) {
            Some(i) => {
                self.faults.remove(i);
                true
            }
            None => false,
        }
    }
}

#[derive(Clone)]
pub struct Sysfs {
    tree: Arc<Mutex<Tree>>,
}

impl Default for Sysfs {
    fn default() -> Self {
        Self::new()
    }
}

impl Sysfs {
    pub fn new() -> Self {
        let mut tree = Tree::default();
        tree.dirs.insert(KERNEL_KOBJ.to_string());
        Self {
            tree: Arc::new(Mutex::new(tree)),
        }
    }

    fn tree(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Arms a one-shot failure of the next matching operation.
    pub fn inject(&self, fault: Fault) {
        self.tree().faults.push(fault);
    }

    /// Creates `parent/name` and returns the kobject owning it.
    pub fn kobject_create_and_add(&self, name: &str, parent: &str) -> Result<KObject> {
        if name.is_empty() || name.contains('/') {
            return Err(Error::InvalidArgument);
        }
        let parent = normalize(parent);
        let path = join(&parent, name);
        let mut tree = self.tree();
        if tree.take_fault(Fault::KObjectAlloc) {
            return Err(Error::NoMemory);
        }
        if !parent.is_empty() && !tree.dirs.contains(&parent) {
            return Err(Error::NotFound(parent));
        }
        if tree.dirs.contains(&path) || tree.files.contains_key(&path) {
            return Err(Error::Exists(path));
        }
        tree.dirs.insert(path.clone());
        Ok(KObject {
            sysfs: self.clone(),
            path,
        })
    }

    pub fn exists(&self, path: &str) -> bool {
        let path = normalize(path);
        let tree = self.tree();
        tree.dirs.contains(&path) || tree.files.contains_key(&path)
    }

    /// Mode bits of the attribute at `path`.
    pub fn mode(&self, path: &str) -> Option<u16> {
        self.tree().files.get(&normalize(path)).map(Attribute::mode)
    }

    /// Names of the entries directly under `dir`, directories suffixed with '/'.
    pub fn list(&self, dir: &str) -> Result<Vec<String>> {
        let dir = normalize(dir);
        let tree = self.tree();
        if !dir.is_empty() && !tree.dirs.contains(&dir) {
            return Err(Error::NotFound(dir));
        }
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{dir}/")
        };
        let direct = |p: &String| {
            p.strip_prefix(&prefix)
                .filter(|rest| !rest.is_empty() && !rest.contains('/'))
                .map(str::to_string)
        };
        let mut names: Vec<String> = tree
            .dirs
            .iter()
            .filter_map(direct)
            .map(|n| format!("{n}/"))
            .collect();
        names.extend(tree.files.keys().filter_map(direct));
        names.sort();
        Ok(names)
    }

    fn lookup(&self, path: &str) -> Result<Attribute> {
        let path = normalize(path);
        self.tree()
            .files
            .get(&path)
            .cloned()
            .ok_or(Error::NotFound(path))
    }

    /// Reads an attribute the way `read(2)` on the file would.
    pub fn read(&self, path: &str, who: Accessor) -> Result<String> {
        let attr = self.lookup(path)?;
        if !permits(attr.mode, who, 0o4) {
            return Err(Error::PermissionDenied);
        }
        let mut buf = String::new();
        // The tree lock is not held here: show may take its own locks.
        attr.ops.show(&mut buf)?;
        if buf.len() > PAGE_SIZE {
            let mut end = PAGE_SIZE;
            while !buf.is_char_boundary(end) {
                end -= 1;
            }
            buf.truncate(end);
        }
        Ok(buf)
    }

    /// Writes an attribute the way `write(2)` on the file would.
    pub fn write(&self, path: &str, data: &[u8], who: Accessor) -> Result<usize> {
        let attr = self.lookup(path)?;
        if !permits(attr.mode, who, 0o2) {
            return Err(Error::PermissionDenied);
        }
        let data = &data[..data.len().min(PAGE_SIZE)];
        attr.ops.store(data)
    }

    fn remove_dir(&self, path: &str) {
        let prefix = format!("{path}/");
        let mut tree = self.tree();
        tree.files.retain(|p, _| !p.starts_with(&prefix));
        tree.dirs.retain(|p| p != path && !p.starts_with(&prefix));
    }
}

/// A sysfs directory. Dropping it removes the directory and everything in it.
pub struct KObject {
    sysfs: Sysfs,
    path: String,
}

impl KObject {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Publishes every attribute of `group`, or none of them.
    pub fn create_group(&self, group: &AttributeGroup) -> Result<()> {
        let dir = match group.name {
            Some(name) => join(&self.path, name),
            None => self.path.clone(),
        };
        let mut tree = self.sysfs.tree();
        if tree.take_fault(Fault::CreateGroup) {
            return Err(Error::NoMemory);
        }
        if group.name.is_some() && tree.dirs.contains(&dir) {
            return Err(Error::Exists(dir));
        }
        let mut seen = BTreeSet::new();
        for attr in &group.attrs {
            // Sysfs attributes cannot be world-writable.
            if attr.mode & 0o002 != 0 || attr.mode & !0o777 != 0 {
                return Err(Error::InvalidArgument);
            }
            let path = join(&dir, attr.name);
            if !seen.insert(path.clone()) || tree.files.contains_key(&path) {
                return Err(Error::Exists(path));
            }
        }
        if group.name.is_some() {
            tree.dirs.insert(dir.clone());
        }
        for attr in &group.attrs {
            tree.files.insert(join(&dir, attr.name), attr.clone());
        }
        Ok(())
    }
}

impl Drop for KObject {
    fn drop(&mut self) {
        self.sysfs.remove_dir(&self.path);
    }
}

fn permits(mode: u16, who: Accessor, bit: u16) -> bool {
    let shift = match who {
        Accessor::Owner => 6,
        Accessor::Other => 0,
    };
    mode & (bit << shift) != 0
}

fn normalize(path: &str) -> String {
    let path = path.strip_prefix(SYSFS_MOUNT).unwrap_or(path);
    path.split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .collect::<Vec<_>>()
        .join("/")
}

fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Counter(AtomicU32);

    impl AttributeOps for Counter {
        fn show(&self, buf: &mut String) -> Result<()> {
            buf.push_str(&format!("{}\n", self.0.load(Ordering::Relaxed)));
            Ok(())
        }

        fn store(&self, buf: &[u8]) -> Result<usize> {
            self.0.store(buf.len() as u32, Ordering::Relaxed);
            Ok(buf.len())
        }
    }

    fn group(mode: u16) -> AttributeGroup {
        AttributeGroup {
            name: None,
            attrs: vec![Attribute::new(
                "count",
                mode,
                Arc::new(Counter(AtomicU32::new(0))),
            )],
        }
    }

    #[test]
    fn group_files_live_under_the_kobject() {
        let sysfs = Sysfs::new();
        let kobj = sysfs.kobject_create_and_add("demo", KERNEL_KOBJ).unwrap();
        kobj.create_group(&group(0o644)).unwrap();

        assert!(sysfs.exists("/sys/kernel/demo/count"));
        assert_eq!(sysfs.mode("kernel/demo/count"), Some(0o644));
        assert_eq!(sysfs.list("/sys/kernel").unwrap(), vec!["demo/"]);
        assert_eq!(sysfs.list("kernel/demo").unwrap(), vec!["count"]);

        sysfs.write("kernel/demo/count", b"abc", Accessor::Owner).unwrap();
        assert_eq!(sysfs.read("kernel/demo/count", Accessor::Other).unwrap(), "3\n");
    }

    #[test]
    fn dropping_the_kobject_removes_everything() {
        let sysfs = Sysfs::new();
        let kobj = sysfs.kobject_create_and_add("demo", KERNEL_KOBJ).unwrap();
        kobj.create_group(&group(0o644)).unwrap();
        drop(kobj);

        assert!(!sysfs.exists("kernel/demo"));
        assert!(matches!(
            sysfs.read("kernel/demo/count", Accessor::Owner),
            Err(Error::NotFound(_))
        ));
        assert!(sysfs.exists("kernel"));
    }

    #[test]
    fn duplicate_kobject_is_rejected() {
        let sysfs = Sysfs::new();
        let _a = sysfs.kobject_create_and_add("demo", KERNEL_KOBJ).unwrap();
        assert!(matches!(
            sysfs.kobject_create_and_add("demo", KERNEL_KOBJ),
            Err(Error::Exists(_))
        ));
    }

    #[test]
    fn others_cannot_write_owner_only_files() {
        let sysfs = Sysfs::new();
        let kobj = sysfs.kobject_create_and_add("demo", KERNEL_KOBJ).unwrap();
        kobj.create_group(&group(0o644)).unwrap();
        assert!(matches!(
            sysfs.write("kernel/demo/count", b"1", Accessor::Other),
            Err(Error::PermissionDenied)
        ));
    }

    #[test]
    fn world_writable_attributes_are_refused() {
        let sysfs = Sysfs::new();
        let kobj = sysfs.kobject_create_and_add("demo", KERNEL_KOBJ).unwrap();
        assert!(matches!(
            kobj.create_group(&group(0o666)),
            Err(Error::InvalidArgument)
        ));
        assert_eq!(sysfs.list("kernel/demo").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn writes_are_clamped_to_a_page() {
        let sysfs = Sysfs::new();
        let kobj = sysfs.kobject_create_and_add("demo", KERNEL_KOBJ).unwrap();
        kobj.create_group(&group(0o644)).unwrap();
        let big = vec![b'x'; PAGE_SIZE * 2];
        assert_eq!(
            sysfs.write("kernel/demo/count", &big, Accessor::Owner).unwrap(),
            PAGE_SIZE
        );
    }

    #[test]
    fn injected_faults_fire_once() {
        let sysfs = Sysfs::new();
        sysfs.inject(Fault::KObjectAlloc);
        assert!(matches!(
            sysfs.kobject_create_and_add("demo", KERNEL_KOBJ),
            Err(Error::NoMemory)
        ));
        let kobj = sysfs.kobject_create_and_add("demo", KERNEL_KOBJ).unwrap();

        sysfs.inject(Fault::CreateGroup);
        assert!(kobj.create_group(&group(0o644)).is_err());
        assert!(kobj.create_group(&group(0o644)).is_ok());
    }
}
