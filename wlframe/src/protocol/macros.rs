/// Syntax in BNF format:
/// ```text
/// "declare_interfaces!" "{"
///    ( "@interface" "(" <interface-name> "=" <wire-name> ")" "{"
///        (
///          "@requests" "{"
///              (<request-name>"("(<arg> ":" <type>)*")" ("=>" "[" (<wire-values> ",")+ "]")? ";")+
///          "}"
///        )?
///
///        // A new enum named "<interface-name>Event" is generated and for each <event-name>
///        // there is a variant on this enum in CamelCase. Interfaces without events get
///        // an empty enum.
///        (
///          "@events" "{"
///              (<event-name> "(" (<arg> ":" <type>)* ")" ";" )+
///          "}"
///        )?
///    "}" ",")+
/// "}"
/// ```
/// Requests and events are numbered in declaration order, so every opcode up to the
/// last one used has to be declared.
macro_rules! declare_interfaces {
    {
        $(@interface($name : ident = $wire_name : literal) {
            $(@requests {
                $($rt : tt)+
            })?
            $(@events {
                $($et : tt)+
            })?
        }),+ $(,)?
    } => {
        #[allow(unused_imports)]
        use $crate::{
            error,
            protocol::*,
            wire_format::parsing::{self as parser, WireArg},
        };

        paste::paste! {
            $(
                declare_interfaces!(@decl $name, $wire_name, [< $name Event >] $(, $($et)+)?);
                $(declare_interfaces!(@requests $name, $($rt)+);)?
            )+
        }
    };

    (@requests $name : ident, $($t : tt)+) => {
        impl $name {
            declare_interfaces!(@next_request 0, $($t)+);
        }
    };

    (
        @next_request $id : expr,
        $request : ident ($($arg : ident : $type : ty),*)
        $(=> [$($value : expr),+ $(,)?])?; $($t : tt)*
    ) => {
        pub fn $request(&self $(, $arg : $type)*) -> error::Result<usize> {
            let values: &[WireValue] = &[$($($value),+)?];
            if log::log_enabled!(log::Level::Debug) {
                log::debug!(
                    concat!("{} @ {} -> ", stringify!($request), "({})"),
                    self.get_object_id(),
                    Self::WIRE_NAME,
                    values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
                );
            }

            self.0.stream.send(WireMessage {
                object_id: self.get_object_id(),
                opcode: $id,
                values,
            })
        }

        declare_interfaces!(@next_request $id + 1, $($t)*);
    };

    (@next_request $id : expr, ) => {};

    (
        @decl $name : ident, $wire_name : literal, $event_type : ident
        $(, $($event : ident ($($arg : ident : $ty : ty),*));+ $(;)?)?
    ) => {
        paste::paste! {
            #[derive(Debug, Clone, PartialEq, Eq)]
            pub enum $event_type {
                $($([< $event:camel >] { $($arg : $ty),* },)+)?
            }
        }

        #[derive(Clone, Debug)]
        pub struct $name(WlObjectMetaData);

        impl WlInterface for $name {
            type Event = $event_type;

            const INTERFACE: Interface = Interface::$name;
            const WIRE_NAME: &'static str = $wire_name;

            fn get_object_id(&self) -> WaylandId {
                self.0.object_id
            }

            fn build(object_id: WaylandId, stream: std::rc::Rc<dyn WaylandStream>) -> Self {
                Self(WlObjectMetaData { object_id, stream })
            }

            #[allow(unused_variables)]
            fn parse_event(
                sender: WaylandId,
                opcode: WlOpcode,
                cursor: &mut parser::Cursor<'_>,
            ) -> std::result::Result<Self::Event, WlEventParseError> {
                $(declare_interfaces!(
                    @next_event sender, opcode, cursor, $event_type, 0,
                    $($event ($($arg : $ty),*);)+
                );)?
                Err(WlEventParseError::NoEvent(opcode))
            }
        }
    };

    (
        @next_event $sender : ident, $opcode : ident, $cursor : ident,
        $event_type : ident, $id : expr,
        $event : ident ($($arg : ident : $ty : ty),*); $($rem : tt)*
    ) => {
        if $opcode == $id {
            $(let $arg = <$ty as WireArg>::parse($cursor)?;)*
            log::debug!(
                concat!("{} @ {} <- ", stringify!($event), "{:?}"),
                $sender,
                Self::WIRE_NAME,
                ($(&$arg,)*)
            );
            return Ok(paste::paste!($event_type::[< $event:camel >] { $($arg),* }));
        }

        declare_interfaces!(@next_event $sender, $opcode, $cursor, $event_type, $id + 1, $($rem)*);
    };

    (
        @next_event $sender : ident, $opcode : ident, $cursor : ident,
        $event_type : ident, $id : expr,
    ) => {};
}

/// Generates the closed `Interface` tag and the `Event` sum type over every declared
/// interface, so incoming messages are parsed by matching on the tag stored with the
/// object instead of looking up handlers by name.
macro_rules! declare_routing {
    ($($name : ident),+ $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Interface {
            $($name,)+
        }

        impl Interface {
            pub fn wire_name(self) -> &'static str {
                match self {
                    $(Self::$name => <$name as WlInterface>::WIRE_NAME,)+
                }
            }

            pub fn parse(self, msg: &RawMessage) -> std::result::Result<Event, WlEventParseError> {
                match self {
                    $(Self::$name => $name::parse_msg(msg).map(Event::$name),)+
                }
            }
        }

        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum Event {
            $($name(<$name as WlInterface>::Event),)+
        }
    };
}

pub(super) use declare_interfaces;
pub(super) use declare_routing;
