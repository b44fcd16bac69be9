//! The move-only owner of a single socket.

use std::fmt::{self, Debug, Formatter};

use endpoint_api::{Domain, Environment, Error, Protocol, ResourceId, Result, Type};

/// Owns at most one socket of an [`Environment`].
///
/// A `Handle` is not `Clone`: ownership moves with the value, or explicitly through
/// [`Handle::take`] and [`Handle::take_ownership`], which leave the source unowned. Dropping a
/// handle closes the socket it still owns, so every socket is closed exactly once no matter how
/// often it changed hands.
///
/// # Panics
///
/// Dropping a handle panics if closing its socket fails, unless the thread is already unwinding.
/// A failed close means the socket table is no longer what this process thinks it is. Call
/// [`Handle::release`] first to handle the error instead.
pub struct Handle<E: Environment> {
    env: E,
    resource: Option<E::Resource>,
}

impl<E: Environment> Handle<E> {
    /// Creates an unowned handle.
    pub fn new(env: E) -> Self {
        Self {
            env,
            resource: None,
        }
    }

    /// Creates a handle owning a socket allocated elsewhere.
    pub fn adopt(env: E, resource: E::Resource) -> Self {
        Self {
            env,
            resource: Some(resource),
        }
    }

    /// Returns the environment the socket belongs to.
    pub fn environment(&self) -> &E {
        &self.env
    }

    /// Returns the owned socket.
    pub fn resource(&self) -> Option<&E::Resource> {
        self.resource.as_ref()
    }

    /// Returns the identifier of the owned socket, or `None` if unowned.
    pub fn id(&self) -> Option<ResourceId> {
        self.resource.as_ref().map(|resource| self.env.id(resource))
    }

    /// Returns whether this handle owns a socket.
    pub fn is_owned(&self) -> bool {
        self.resource.is_some()
    }

    /// Allocates a new socket, closing the one owned before.
    ///
    /// Nothing is allocated if closing the previous socket fails.
    pub fn acquire(&mut self, domain: Domain, ty: Type, protocol: Option<Protocol>) -> Result<()> {
        self.release()?;

        let resource = self
            .env
            .acquire(domain, ty, protocol)
            .map_err(Error::ResourceExhausted)?;
        tracing::debug!(id = %self.env.id(&resource), ?ty, "acquired socket");

        self.resource = Some(resource);
        Ok(())
    }

    /// Closes the owned socket.
    ///
    /// The handle is unowned afterwards, whether closing succeeded or not. Does nothing on an
    /// unowned handle.
    pub fn release(&mut self) -> Result<()> {
        let Some(resource) = self.resource.take() else {
            return Ok(());
        };

        let id = self.env.id(&resource);
        tracing::debug!(%id, "closing socket");
        self.env
            .close(resource)
            .map_err(|source| Error::ReleaseFailed { id, source })
    }

    /// Detaches the owned socket without closing it.
    ///
    /// The caller becomes responsible for closing it, usually by adopting it into another handle.
    pub fn take_ownership(&mut self) -> Option<E::Resource> {
        self.resource.take()
    }

    /// Moves the owned socket into a new handle, leaving this one unowned.
    pub fn take(&mut self) -> Self {
        Self {
            env: self.env.clone(),
            resource: self.resource.take(),
        }
    }
}

impl<E: Environment> Debug for Handle<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle").field("id", &self.id()).finish()
    }
}

impl<E: Environment> Drop for Handle<E> {
    fn drop(&mut self) {
        if let Err(error) = self.release() {
            tracing::error!(%error, "failed to release socket");
            if !std::thread::panicking() {
                panic!("{error}");
            }
        }
    }
}
