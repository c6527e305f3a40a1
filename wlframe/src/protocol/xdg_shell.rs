use super::declare_interfaces;

declare_interfaces! {
    @interface(XdgWmBase = "xdg_wm_base") {
        @requests {
            destroy();
            create_positioner(positioner: WaylandId) => [Uint32(positioner)];
            get_xdg_surface(xdg_surface: &XdgSurface, surface: &WlSurface) => [
                Uint32(xdg_surface.get_object_id()), Uint32(surface.get_object_id()),
            ];
            pong(serial: u32) => [Uint32(serial)];
        }

        @events { ping(serial: u32); }
    },

    @interface(XdgSurface = "xdg_surface") {
        @requests {
            destroy();
            get_toplevel(toplevel: &XdgToplevel) => [Uint32(toplevel.get_object_id())];
            get_popup(popup: WaylandId, parent: WaylandId, positioner: WaylandId) => [
                Uint32(popup), Uint32(parent), Uint32(positioner),
            ];
            set_window_geometry(x: i32, y: i32, width: i32, height: i32) => [
                Int32(x), Int32(y), Int32(width), Int32(height),
            ];
            ack_configure(serial: u32) => [Uint32(serial)];
        }

        @events { configure(serial: u32); }
    },

    @interface(XdgToplevel = "xdg_toplevel") {
        @requests {
            destroy();
            set_parent(parent: Option<&XdgToplevel>) => [
                Uint32(parent.map_or(0, |p| p.get_object_id())),
            ];
            set_title(title: &str) => [Str(title.to_string())];
            set_app_id(app_id: &str) => [Str(app_id.to_string())];
        }

        @events {
            configure(width: i32, height: i32, states: Vec<u32>);
            close();
            configure_bounds(width: i32, height: i32);
            wm_capabilities(capabilities: Vec<u32>);
        }
    },
}
