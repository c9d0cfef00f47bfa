//! Execution context handed to commands.
//!
//! Commands receive everything they need explicitly: the open transaction of
//! the migration they belong to, and shared values registered on the
//! [`Migrator`](crate::Migrator) through [`Migrator::data`](crate::Migrator::data).

use std::{
    any::{type_name, Any, TypeId},
    collections::HashMap,
    fmt,
    hash::{BuildHasherDefault, Hasher},
};

use deploy_migration_store::Engine;

/// `TypeId` is already a hash, pass it through.
#[derive(Debug, Default)]
struct TypeIdHasher(u64);

impl Hasher for TypeIdHasher {
    fn write(&mut self, _bytes: &[u8]) {
        unimplemented!("TypeIdHasher only hashes TypeId")
    }

    fn write_u64(&mut self, i: u64) {
        self.0 = i;
    }

    fn finish(&self) -> u64 {
        self.0
    }
}

/// Values shared with every command, stored by type.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>, BuildHasherDefault<TypeIdHasher>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value, returning the previous one of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, val: T) -> Option<T> {
        self.map
            .insert(TypeId::of::<T>(), Box::new(val))
            .and_then(|boxed| boxed.downcast().ok().map(|boxed| *boxed))
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<T>())
    }

    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref())
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions")
            .field("len", &self.map.len())
            .finish()
    }
}

pub struct Context<'a, E: Engine> {
    migration: &'a str,
    command: &'a str,
    tx: &'a mut E::Transaction,
    extensions: &'a Extensions,
}

impl<'a, E: Engine> Context<'a, E> {
    pub fn new(
        migration: &'a str,
        command: &'a str,
        tx: &'a mut E::Transaction,
        extensions: &'a Extensions,
    ) -> Self {
        Self {
            migration,
            command,
            tx,
            extensions,
        }
    }

    pub fn migration(&self) -> &str {
        self.migration
    }

    pub fn command(&self) -> &str {
        self.command
    }

    /// Transaction of the running migration; writes made through it are
    /// rolled back if the migration fails.
    pub fn tx(&mut self) -> &mut E::Transaction {
        &mut *self.tx
    }

    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.extensions.get()
    }

    /// Like [`Context::get`], failing with an error naming the missing type.
    pub fn extract<T: 'static>(&self) -> anyhow::Result<&T> {
        self.get().ok_or_else(|| {
            anyhow::anyhow!(
                "`{}` is not registered, add it with `Migrator::data`",
                type_name::<T>()
            )
        })
    }
}
