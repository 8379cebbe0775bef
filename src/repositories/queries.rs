use sqlx::PgConnection;
use std::ops::DerefMut;

/// PostgreSQL data access bound to a single connection handle.
///
/// `C` is anything that dereferences to a `PgConnection`: a connection checked
/// out of the pool, or an open `sqlx::Transaction`. Binding to a transaction is
/// how every write of a transfer lands in the same atomic scope.
pub struct Queries<C> {
    pub(crate) conn: C,
}

impl<C> Queries<C>
where
    C: DerefMut<Target = PgConnection> + Send,
{
    pub fn new(conn: C) -> Self {
        Self { conn }
    }

    /// Gives back the underlying handle.
    pub fn into_inner(self) -> C {
        self.conn
    }

    pub(crate) fn connection(&mut self) -> &mut PgConnection {
        &mut *self.conn
    }
}
