use super::declare_interfaces;

declare_interfaces! {
    @interface(WlDisplay = "wl_display") {
        @requests {
            sync(callback: &WlCallback) => [Uint32(callback.get_object_id())];
            get_registry(registry: &WlRegistry) => [Uint32(registry.get_object_id())];
        }

        @events {
            error(object_id: u32, code: u32, message: String);
            delete_id(id: u32);
        }
    },

    @interface(WlRegistry = "wl_registry") {
        @requests {
            bind(name: u32, interface: &str, version: u32, new_id: WaylandId) => [
                Uint32(name), Str(interface.to_string()), Uint32(version), Uint32(new_id),
            ];
        }

        @events {
            global(name: u32, interface: String, version: u32);
            global_remove(name: u32);
        }
    },

    @interface(WlCallback = "wl_callback") { @events { done(data: u32); } },

    @interface(WlCompositor = "wl_compositor") {
        @requests {
            create_surface(surface: &WlSurface) => [Uint32(surface.get_object_id())];
        }
    },

    @interface(WlRegion = "wl_region") {
        @requests {
            destroy();
        }
    },

    @interface(WlSurface = "wl_surface") {
        @requests {
            destroy();
            attach(buffer: Option<&WlBuffer>, x: i32, y: i32) => [
                Uint32(buffer.map_or(0, |b| b.get_object_id())), Int32(x), Int32(y),
            ];
            damage(x: i32, y: i32, width: i32, height: i32) => [
                Int32(x), Int32(y), Int32(width), Int32(height),
            ];
            frame(callback: &WlCallback) => [Uint32(callback.get_object_id())];
            set_opaque_region(region: Option<&WlRegion>) => [
                Uint32(region.map_or(0, |r| r.get_object_id())),
            ];
            set_input_region(region: Option<&WlRegion>) => [
                Uint32(region.map_or(0, |r| r.get_object_id())),
            ];
            commit();
        }

        @events {
            enter(output: u32);
            leave(output: u32);
            preferred_buffer_scale(factor: i32);
            preferred_buffer_transform(transform: u32);
        }
    },

    // shared memory stuffs
    @interface(WlShm = "wl_shm") {
        @requests {
            create_pool(pool: &WlShmPool, fd: std::os::fd::RawFd, size: i32) => [
                Uint32(pool.get_object_id()), FileDesc(fd), Int32(size),
            ];
        }

        @events { format(format: u32); }
    },

    @interface(WlShmPool = "wl_shm_pool") {
        @requests {
            create_buffer(
                buffer: &WlBuffer, offset: i32, width: i32, height: i32, stride: i32, format: u32
            ) => [
                Uint32(buffer.get_object_id()), Int32(offset), Int32(width),
                Int32(height), Int32(stride), Uint32(format),
            ];
            destroy();
        }
    },

    @interface(WlBuffer = "wl_buffer") {
        @requests { destroy(); }
        @events { release(); }
    },
}
