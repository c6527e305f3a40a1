use std::fmt;

use log::{debug, info, warn};

use crate::{
    error::{Error, Result},
    protocol::{base::*, xdg_shell::*, WlInterface},
    session::WaylandSession,
};

/// The three globals a window cannot do without.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `wl_compositor`, creates surfaces.
    Compositor,
    /// `xdg_wm_base`, gives surfaces a window role.
    Shell,
    /// `wl_shm`, shares memory pools with the server.
    Shm,
}

impl Capability {
    pub const ALL: [Capability; 3] = [Self::Compositor, Self::Shell, Self::Shm];

    pub fn interface_name(self) -> &'static str {
        match self {
            Self::Compositor => WlCompositor::WIRE_NAME,
            Self::Shell => XdgWmBase::WIRE_NAME,
            Self::Shm => WlShm::WIRE_NAME,
        }
    }

    /// Highest version whose events this crate knows how to parse.
    pub fn max_version(self) -> u32 {
        match self {
            Self::Compositor => 4,
            Self::Shell => 1,
            Self::Shm => 1,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = match self {
            Self::Compositor => "surface factory",
            Self::Shell => "shell",
            Self::Shm => "shared memory factory",
        };
        write!(f, "{role} ({})", self.interface_name())
    }
}

/// Classification of an advertised interface name, done once per advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalKind {
    Known(Capability),
    Ignored,
}

impl GlobalKind {
    pub fn classify(interface: &str) -> Self {
        Capability::ALL
            .into_iter()
            .find(|c| c.interface_name() == interface)
            .map_or(Self::Ignored, Self::Known)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalAdvertisement {
    pub name: u32,
    pub interface: String,
    pub version: u32,
}

/// Proxies for every required global, plus the formats `wl_shm` advertised.
#[derive(Debug, Clone)]
pub struct Globals {
    pub compositor: WlCompositor,
    pub wm_base: XdgWmBase,
    pub shm: WlShm,
    pub shm_formats: Vec<u32>,
}

pub struct RegistryBinder {
    registry: WlRegistry,
    compositor: Option<WlCompositor>,
    wm_base: Option<XdgWmBase>,
    shm: Option<WlShm>,
    shm_formats: Vec<u32>,
}

impl RegistryBinder {
    /// Requests the registry. Advertisements arrive with the next dispatch.
    pub fn new(session: &mut WaylandSession) -> Result<Self> {
        let registry: WlRegistry = session.new_object();
        session.display().get_registry(&registry)?;

        Ok(Self {
            registry,
            compositor: None,
            wm_base: None,
            shm: None,
            shm_formats: Vec::new(),
        })
    }

    pub fn registry(&self) -> &WlRegistry {
        &self.registry
    }

    pub fn on_global(
        &mut self,
        session: &mut WaylandSession,
        global: GlobalAdvertisement,
    ) -> Result<()> {
        let capability = match GlobalKind::classify(&global.interface) {
            GlobalKind::Known(capability) => capability,
            GlobalKind::Ignored => {
                debug!("Ignoring global {} v{}", global.interface, global.version);
                return Ok(());
            }
        };

        if self.is_bound(capability) {
            warn!("Global {} advertised twice, keeping the first one", global.interface);
            return Ok(());
        }

        if global.version == 0 {
            warn!("Ignoring {} advertised with version 0", global.interface);
            return Ok(());
        }

        match capability {
            Capability::Compositor => {
                self.compositor = Some(self.bind(session, &global, capability)?)
            }
            Capability::Shell => self.wm_base = Some(self.bind(session, &global, capability)?),
            Capability::Shm => self.shm = Some(self.bind(session, &global, capability)?),
        }
        Ok(())
    }

    pub fn on_global_remove(&mut self, name: u32) {
        info!("Registry: global {name} removed");
    }

    pub fn on_shm_format(&mut self, format: u32) {
        debug!("Possible shm format: {format:#x}");
        if !self.shm_formats.contains(&format) {
            self.shm_formats.push(format);
        }
    }

    pub fn is_bound(&self, capability: Capability) -> bool {
        match capability {
            Capability::Compositor => self.compositor.is_some(),
            Capability::Shell => self.wm_base.is_some(),
            Capability::Shm => self.shm.is_some(),
        }
    }

    /// Meant to be called after the startup roundtrips.
    pub fn globals(&self) -> Result<Globals> {
        let missing = Error::MissingGlobal;

        Ok(Globals {
            compositor: self.compositor.clone().ok_or(missing(Capability::Compositor))?,
            wm_base: self.wm_base.clone().ok_or(missing(Capability::Shell))?,
            shm: self.shm.clone().ok_or(missing(Capability::Shm))?,
            shm_formats: self.shm_formats.clone(),
        })
    }

    /// Destroys the proxies that have a destructor request.
    pub fn destroy(&mut self, session: &mut WaylandSession) -> Result<()> {
        if let Some(wm_base) = self.wm_base.take() {
            wm_base.destroy()?;
            session.release_object(wm_base.get_object_id());
        }
        Ok(())
    }

    fn bind<T: WlInterface>(
        &self,
        session: &mut WaylandSession,
        global: &GlobalAdvertisement,
        capability: Capability,
    ) -> Result<T> {
        let version = global.version.min(capability.max_version());
        let proxy: T = session.new_object();

        self.registry
            .bind(global.name, &global.interface, version, proxy.get_object_id())?;
        info!("Bound {capability} v{version} as object {}", proxy.get_object_id());
        Ok(proxy)
    }
}
