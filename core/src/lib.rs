#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the park scripting host.
//!
//! This crate defines the message surface that connects plugins, the
//! authoritative world, and the host systems. The world mutates only through
//! [`Command`] values passed to its `apply` entry point and reports what
//! happened through [`Event`] values. Plugins never touch the world directly:
//! they submit game actions by identifier with [`ActionArgs`] and receive a
//! [`GameActionResult`], and they observe the simulation through [`HookEvent`]
//! payloads delivered to their subscriptions.

mod element;

use std::{collections::BTreeMap, fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use element::{
    ElementPayload, EntranceElement, FootpathAddition, FootpathAdditionStatus, FootpathElement,
    SceneryElement, SurfaceElement, TileElement, TileElementType, TrackElement, WallElement,
    OWNERSHIP_AVAILABLE, OWNERSHIP_CONSTRUCTION_RIGHTS_AVAILABLE,
    OWNERSHIP_CONSTRUCTION_RIGHTS_OWNED, OWNERSHIP_OWNED,
};

/// Version of the scripting API implemented by this host.
pub const API_VERSION: u32 = 1;

/// Number of game units spanned by a single tile edge.
pub const COORDS_PER_TILE: i32 = 32;

/// Unique identifier assigned to a connected player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(u8);

impl PlayerId {
    /// Creates a new player identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u8 {
        self.0
    }
}

/// Unique identifier assigned to a player group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(u8);

impl GroupId {
    /// Creates a new group identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u8 {
        self.0
    }
}

/// Stable identifier of a ride for as long as the ride exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RideId(u16);

impl RideId {
    /// Creates a new ride identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u16 {
        self.0
    }
}

/// Identifier of a movable thing. Identifiers are reused after destruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ThingId(u16);

impl ThingId {
    /// Creates a new thing identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u16 {
        self.0
    }
}

/// Identifier assigned to a plugin each time it is loaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PluginId(u32);

impl PluginId {
    /// Creates a new plugin identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Identifier correlating an action request with its response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(u64);

impl RequestId {
    /// Creates a new request identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Two-dimensional coordinate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord2 {
    x: i32,
    y: i32,
}

impl Coord2 {
    /// Creates a new coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Horizontal component.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Vertical component.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }
}

/// Three-dimensional coordinate expressed in game units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord3 {
    x: i32,
    y: i32,
    z: i32,
}

impl Coord3 {
    /// Creates a new coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Horizontal component.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Vertical component on the map plane.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Height component.
    #[must_use]
    pub const fn z(&self) -> i32 {
        self.z
    }

    /// Game-unit position of the north corner of the given tile at height `z`.
    #[must_use]
    pub const fn from_tile(tile_x: i32, tile_y: i32, z: i32) -> Self {
        Self {
            x: tile_x * COORDS_PER_TILE,
            y: tile_y * COORDS_PER_TILE,
            z,
        }
    }
}

/// Dimensions of the tile map measured in whole tiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapSize {
    x: u32,
    y: u32,
}

impl MapSize {
    /// Creates a new map size descriptor.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Number of tiles along the x axis.
    #[must_use]
    pub const fn x(&self) -> u32 {
        self.x
    }

    /// Number of tiles along the y axis.
    #[must_use]
    pub const fn y(&self) -> u32 {
        self.y
    }

    /// Total number of tiles contained in the map.
    #[must_use]
    pub fn tile_count(&self) -> usize {
        usize::try_from(u64::from(self.x) * u64::from(self.y)).unwrap_or(0)
    }

    /// Reports whether the signed tile coordinate lies inside the map.
    #[must_use]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        match (u32::try_from(x), u32::try_from(y)) {
            (Ok(x), Ok(y)) => x < self.x && y < self.y,
            _ => false,
        }
    }
}

/// Opaque typed data exchanged with plugins.
///
/// Values stored in configuration or passed as action arguments round-trip
/// exactly, including the distinction between integers and floats.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ScriptValue {
    /// Absence of a value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer value.
    Int(i64),
    /// Floating point value. NaN and the infinities are kept as well.
    Float(#[serde(with = "float_repr")] f64),
    /// UTF-8 string value.
    Str(String),
    /// Ordered list of values.
    List(Vec<ScriptValue>),
    /// String-keyed map of values.
    Map(BTreeMap<String, ScriptValue>),
}

/// Text forms have no NaN or infinity, so those are written as the strings
/// `NaN`, `inf` and `-inf`. Binary formats keep the raw `f64`.
mod float_repr {
    use std::fmt;

    use serde::{de, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() || !serializer.is_human_readable() {
            return serializer.serialize_f64(*value);
        }
        let text = if value.is_nan() {
            "NaN"
        } else if value.is_sign_positive() {
            "inf"
        } else {
            "-inf"
        };
        serializer.serialize_str(text)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_any(FloatVisitor)
        } else {
            deserializer.deserialize_f64(FloatVisitor)
        }
    }

    struct FloatVisitor;

    impl de::Visitor<'_> for FloatVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a number or one of NaN, inf, -inf")
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<f64, E> {
            Ok(value)
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<f64, E> {
            Ok(value as f64)
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<f64, E> {
            Ok(value as f64)
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<f64, E> {
            match value {
                "NaN" => Ok(f64::NAN),
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
            }
        }
    }
}

impl ScriptValue {
    /// Returns the integer payload, if the value holds one.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the boolean payload, if the value holds one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the string payload, if the value holds one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }
}

impl From<bool> for ScriptValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ScriptValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for ScriptValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for ScriptValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for ScriptValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ScriptValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for ScriptValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// Structured key-value arguments attached to a game action request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionArgs {
    values: BTreeMap<String, ScriptValue>,
}

impl ActionArgs {
    /// Creates an empty argument set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the argument set extended with the provided entry.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ScriptValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Inserts or replaces an entry.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ScriptValue>) {
        let _ = self.values.insert(key.into(), value.into());
    }

    /// Looks up the raw value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ScriptValue> {
        self.values.get(key)
    }

    /// Number of entries in the argument set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Reports whether the argument set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterator over the entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScriptValue)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Reads a mandatory integer argument.
    pub fn int(&self, key: &str) -> Result<i64, ScriptError> {
        match self.values.get(key) {
            Some(ScriptValue::Int(value)) => Ok(*value),
            Some(_) => Err(ScriptError::InvalidArguments(format!(
                "argument '{key}' must be an integer"
            ))),
            None => Err(ScriptError::InvalidArguments(format!(
                "missing argument '{key}'"
            ))),
        }
    }

    /// Reads an optional integer argument, falling back to `default` when absent.
    pub fn int_or(&self, key: &str, default: i64) -> Result<i64, ScriptError> {
        if self.values.contains_key(key) {
            self.int(key)
        } else {
            Ok(default)
        }
    }

    /// Reads a mandatory integer argument and narrows it to the target type.
    pub fn int_as<T>(&self, key: &str) -> Result<T, ScriptError>
    where
        T: TryFrom<i64>,
    {
        let value = self.int(key)?;
        T::try_from(value).map_err(|_| {
            ScriptError::InvalidArguments(format!("argument '{key}' is out of range: {value}"))
        })
    }

    /// Reads a mandatory string argument.
    pub fn string(&self, key: &str) -> Result<&str, ScriptError> {
        match self.values.get(key) {
            Some(ScriptValue::Str(value)) => Ok(value),
            Some(_) => Err(ScriptError::InvalidArguments(format!(
                "argument '{key}' must be a string"
            ))),
            None => Err(ScriptError::InvalidArguments(format!(
                "missing argument '{key}'"
            ))),
        }
    }
}

/// Closed set of capabilities that gate game actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionType {
    /// Send chat messages.
    Chat,
    /// Modify land height and slope.
    Terraform,
    /// Raise or lower water.
    SetWaterLevel,
    /// Pause or resume the game.
    TogglePause,
    /// Create new rides.
    CreateRide,
    /// Demolish rides.
    RemoveRide,
    /// Build ride track and entrances.
    BuildRide,
    /// Change ride settings.
    RideProperties,
    /// Place and remove scenery.
    Scenery,
    /// Build and remove footpaths.
    Path,
    /// Clear trees and other landscape items.
    ClearLandscape,
    /// Manage guests.
    Guest,
    /// Hire and manage staff.
    Staff,
    /// Change park settings.
    ParkProperties,
    /// Manage loans and finances.
    ParkFunding,
    /// Disconnect other players.
    KickPlayer,
    /// Edit player groups.
    ModifyGroups,
    /// Move players between groups.
    SetPlayerGroup,
    /// Use cheats.
    Cheat,
    /// Toggle scenery cluster placement.
    ToggleSceneryCluster,
    /// Join without a password.
    PasswordlessLogin,
    /// Edit tiles directly.
    ModifyTile,
    /// Edit scenario objectives and options.
    EditScenarioOptions,
}

impl PermissionType {
    /// Every permission in declaration order.
    pub const ALL: [PermissionType; 23] = [
        Self::Chat,
        Self::Terraform,
        Self::SetWaterLevel,
        Self::TogglePause,
        Self::CreateRide,
        Self::RemoveRide,
        Self::BuildRide,
        Self::RideProperties,
        Self::Scenery,
        Self::Path,
        Self::ClearLandscape,
        Self::Guest,
        Self::Staff,
        Self::ParkProperties,
        Self::ParkFunding,
        Self::KickPlayer,
        Self::ModifyGroups,
        Self::SetPlayerGroup,
        Self::Cheat,
        Self::ToggleSceneryCluster,
        Self::PasswordlessLogin,
        Self::ModifyTile,
        Self::EditScenarioOptions,
    ];

    /// Script-facing tag of the permission.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Terraform => "terraform",
            Self::SetWaterLevel => "set_water_level",
            Self::TogglePause => "toggle_pause",
            Self::CreateRide => "create_ride",
            Self::RemoveRide => "remove_ride",
            Self::BuildRide => "build_ride",
            Self::RideProperties => "ride_properties",
            Self::Scenery => "scenery",
            Self::Path => "path",
            Self::ClearLandscape => "clear_landscape",
            Self::Guest => "guest",
            Self::Staff => "staff",
            Self::ParkProperties => "park_properties",
            Self::ParkFunding => "park_funding",
            Self::KickPlayer => "kick_player",
            Self::ModifyGroups => "modify_groups",
            Self::SetPlayerGroup => "set_player_group",
            Self::Cheat => "cheat",
            Self::ToggleSceneryCluster => "toggle_scenery_cluster",
            Self::PasswordlessLogin => "passwordless_login",
            Self::ModifyTile => "modify_tile",
            Self::EditScenarioOptions => "edit_scenario_options",
        }
    }
}

impl fmt::Display for PermissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionType {
    type Err = ScriptError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|permission| permission.as_str() == value)
            .ok_or_else(|| ScriptError::UnknownPermission(value.to_owned()))
    }
}

/// Finance category that an action's cost is booked against.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ExpenditureType {
    /// Building rides and track.
    #[default]
    RideConstruction,
    /// Ride upkeep.
    RideRunningCosts,
    /// Buying land and construction rights.
    LandPurchase,
    /// Terraforming and scenery.
    Landscaping,
    /// Income from park entry.
    ParkEntranceTickets,
    /// Income from ride tickets.
    ParkRideTickets,
    /// Income from shops.
    ShopSales,
    /// Shop stock purchases.
    ShopStock,
    /// Income from food and drink.
    FoodDrinkSales,
    /// Food and drink stock purchases.
    FoodDrinkStock,
    /// Staff wages.
    Wages,
    /// Marketing campaigns.
    Marketing,
    /// Research funding.
    Research,
    /// Loan interest.
    Interest,
}

impl ExpenditureType {
    /// Script-facing tag of the category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RideConstruction => "ride_construction",
            Self::RideRunningCosts => "ride_runningcosts",
            Self::LandPurchase => "land_purchase",
            Self::Landscaping => "landscaping",
            Self::ParkEntranceTickets => "park_entrance_tickets",
            Self::ParkRideTickets => "park_ride_tickets",
            Self::ShopSales => "shop_sales",
            Self::ShopStock => "shop_stock",
            Self::FoodDrinkSales => "food_drink_sales",
            Self::FoodDrinkStock => "food_drink_stock",
            Self::Wages => "wages",
            Self::Marketing => "marketing",
            Self::Research => "research",
            Self::Interest => "interest",
        }
    }
}

/// Reasons a game action can be rejected.
///
/// The script-visible `error` string of a [`GameActionResult`] is the tag of
/// one of these values. Permission denials and simulation rule rejections use
/// the same shape so scripts cannot tell them apart beyond the message text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionStatus {
    /// Arguments were well-formed but describe an impossible request.
    InvalidParameters,
    /// The action is not allowed for the caller or in the current state.
    Disallowed,
    /// The park cannot afford the action.
    InsufficientFunds,
    /// The park does not own the targeted land.
    NotOwned,
    /// The requested height is below the permitted range.
    TooLow,
    /// The requested height is above the permitted range.
    TooHigh,
    /// Another element blocks the requested space.
    NoClearance,
    /// An identical item already occupies the requested space.
    ItemAlreadyPlaced,
    /// The targeted entity no longer exists.
    NotFound,
    /// No response arrived before the liveness timeout elapsed.
    Timeout,
    /// The connection to the server was lost.
    Disconnected,
    /// The handler failed unexpectedly.
    Unknown,
}

impl ActionStatus {
    /// Script-facing tag written to [`GameActionResult::error`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidParameters => "invalid_parameters",
            Self::Disallowed => "disallowed",
            Self::InsufficientFunds => "insufficient_funds",
            Self::NotOwned => "not_owned",
            Self::TooLow => "too_low",
            Self::TooHigh => "too_high",
            Self::NoClearance => "no_clearance",
            Self::ItemAlreadyPlaced => "item_already_placed",
            Self::NotFound => "not_found",
            Self::Timeout => "timeout",
            Self::Disconnected => "disconnected",
            Self::Unknown => "unknown",
        }
    }
}

/// Outcome of querying or executing a game action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameActionResult {
    /// Empty on success, otherwise the tag of the rejection status.
    pub error: String,
    /// Short human readable title of the failure.
    pub error_title: Option<String>,
    /// Human readable detail of the failure.
    pub error_message: Option<String>,
    /// Game-unit position affected by the action.
    pub position: Coord3,
    /// Monetary cost of the action; negative values are income.
    pub cost: i64,
    /// Finance category the cost is booked against.
    pub expenditure_type: ExpenditureType,
}

impl GameActionResult {
    /// Builds a successful result.
    #[must_use]
    pub fn success(position: Coord3, cost: i64, expenditure_type: ExpenditureType) -> Self {
        Self {
            error: String::new(),
            error_title: None,
            error_message: None,
            position,
            cost,
            expenditure_type,
        }
    }

    /// Builds a rejected result carrying the status tag and display text.
    #[must_use]
    pub fn failure(
        status: ActionStatus,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: status.as_str().to_owned(),
            error_title: Some(title.into()),
            error_message: Some(message.into()),
            position: Coord3::default(),
            cost: 0,
            expenditure_type: ExpenditureType::default(),
        }
    }

    /// Returns the result with the affected position replaced.
    #[must_use]
    pub fn at(mut self, position: Coord3) -> Self {
        self.position = position;
        self
    }

    /// Reports whether the action succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_empty()
    }
}

/// Kind of plugin, which determines where it runs in a networked game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginType {
    /// Runs only on the machine that loaded it.
    Local,
    /// Runs on the server and is distributed to every client.
    Remote,
}

/// Role of this host in the current session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkMode {
    /// Single-player, no network.
    None,
    /// Authoritative server.
    Server,
    /// Client connected to a server.
    Client,
}

impl NetworkMode {
    /// Script-facing tag of the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Server => "server",
            Self::Client => "client",
        }
    }
}

/// Named event sources that plugins may subscribe to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HookType {
    /// Fires once per simulation tick.
    IntervalTick,
    /// Fires once per in-game day boundary.
    IntervalDay,
    /// Fires when a chat message is received.
    NetworkChat,
    /// Fires when a game action is executed by any player.
    NetworkAction,
    /// Fires when a player joins.
    NetworkJoin,
    /// Fires when a player leaves.
    NetworkLeave,
}

impl HookType {
    /// Every hook in declaration order.
    pub const ALL: [HookType; 6] = [
        Self::IntervalTick,
        Self::IntervalDay,
        Self::NetworkChat,
        Self::NetworkAction,
        Self::NetworkJoin,
        Self::NetworkLeave,
    ];

    /// Script-facing name of the hook.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IntervalTick => "interval.tick",
            Self::IntervalDay => "interval.day",
            Self::NetworkChat => "network.chat",
            Self::NetworkAction => "network.action",
            Self::NetworkJoin => "network.join",
            Self::NetworkLeave => "network.leave",
        }
    }
}

impl FromStr for HookType {
    type Err = ScriptError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|hook| hook.as_str() == value)
            .ok_or_else(|| ScriptError::UnknownHook(value.to_owned()))
    }
}

/// Payload delivered to hook subscribers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HookEvent {
    /// A simulation tick elapsed.
    Tick,
    /// An in-game day elapsed.
    Day,
    /// A chat message arrived.
    Chat {
        /// Player that sent the message.
        player: PlayerId,
        /// Message text.
        message: String,
    },
    /// A game action executed successfully.
    Action {
        /// Player that requested the action.
        player: PlayerId,
        /// Identifier of the action.
        action: String,
        /// Result of the execution.
        result: GameActionResult,
    },
    /// A player joined the session.
    Join {
        /// Player that joined.
        player: PlayerId,
    },
    /// A player left the session.
    Leave {
        /// Player that left.
        player: PlayerId,
    },
}

impl HookEvent {
    /// Hook this payload is delivered on.
    #[must_use]
    pub const fn hook(&self) -> HookType {
        match self {
            Self::Tick => HookType::IntervalTick,
            Self::Day => HookType::IntervalDay,
            Self::Chat { .. } => HookType::NetworkChat,
            Self::Action { .. } => HookType::NetworkAction,
            Self::Join { .. } => HookType::NetworkJoin,
            Self::Leave { .. } => HookType::NetworkLeave,
        }
    }
}

/// Type metadata of a ride, shared by every ride built from the same object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RideObject {
    /// Unique object identifier, e.g. `"BURGB   "`.
    pub identifier: String,
    /// Display name.
    pub name: String,
    /// Display description.
    pub description: String,
    /// Text describing the capacity of the ride.
    pub capacity: String,
}

/// Kinds of movable things.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThingType {
    /// Ride vehicle.
    Car,
    /// Duck on water.
    Duck,
    /// Guest or staff member.
    Peep,
}

impl ThingType {
    /// Script-facing tag of the thing type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Car => "car",
            Self::Duck => "duck",
            Self::Peep => "peep",
        }
    }
}

/// Categories of messages that can be posted to the park news feed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParkMessageType {
    /// Message about a ride.
    Attraction,
    /// Message about a guest on a ride.
    PeepOnAttraction,
    /// Message about a guest.
    Peep,
    /// Message about finances.
    Money,
    /// Message without subject.
    Blank,
    /// Research news.
    Research,
    /// Guest count news.
    Guests,
    /// Award news.
    Award,
    /// Chart news.
    Chart,
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Replaces the map with an empty map of the provided size.
    ConfigureMap {
        /// Dimensions of the new map.
        size: MapSize,
    },
    /// Advances the simulation clock by a single tick.
    Tick,
    /// Creates a new ride built from the provided object.
    BuildRide {
        /// Immutable type metadata of the ride.
        object: Arc<RideObject>,
        /// Built-in ride type identifier.
        ride_type: u8,
        /// Display name of the ride.
        name: String,
    },
    /// Destroys a ride.
    DemolishRide {
        /// Ride targeted for demolition.
        ride: RideId,
    },
    /// Creates a movable thing.
    SpawnThing {
        /// Kind of thing to create.
        kind: ThingType,
        /// Initial game-unit position.
        position: Coord3,
    },
    /// Moves an existing thing.
    MoveThing {
        /// Thing to move.
        thing: ThingId,
        /// Destination game-unit position.
        position: Coord3,
    },
    /// Destroys a movable thing.
    RemoveThing {
        /// Thing targeted for removal.
        thing: ThingId,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// The map was replaced.
    MapConfigured {
        /// Dimensions of the new map.
        size: MapSize,
    },
    /// The simulation clock advanced.
    TickAdvanced {
        /// Total number of ticks elapsed after the advance.
        tick: u64,
    },
    /// An in-game day boundary was crossed.
    DayElapsed {
        /// Total number of days elapsed.
        day: u64,
    },
    /// A ride was created.
    RideBuilt {
        /// Identifier assigned to the ride.
        ride: RideId,
    },
    /// A ride was destroyed.
    RideDemolished {
        /// Identifier of the destroyed ride.
        ride: RideId,
    },
    /// A thing was created.
    ThingSpawned {
        /// Identifier assigned to the thing.
        thing: ThingId,
    },
    /// A thing moved.
    ThingMoved {
        /// Identifier of the thing.
        thing: ThingId,
        /// New game-unit position.
        position: Coord3,
    },
    /// A thing was destroyed.
    ThingRemoved {
        /// Identifier of the destroyed thing.
        thing: ThingId,
    },
    /// A command could not be applied.
    CommandRejected {
        /// Specific reason the command failed.
        reason: RejectionReason,
    },
}

/// Reasons a world command may be rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RejectionReason {
    /// The referenced ride does not exist.
    MissingRide(RideId),
    /// The referenced thing does not exist.
    MissingThing(ThingId),
    /// The entity table is full.
    EntityLimit,
}

/// Kinds of engine-owned entities referenced by handles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A ride or stall.
    Ride,
    /// A movable thing.
    Thing,
    /// A connected player.
    Player,
    /// A player group.
    Group,
    /// A loaded plugin.
    Plugin,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ride => "ride",
            Self::Thing => "thing",
            Self::Player => "player",
            Self::Group => "group",
            Self::Plugin => "plugin",
        };
        f.write_str(name)
    }
}

/// Errors reported synchronously to scripts by accessors and entry points.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ScriptError {
    /// The tile coordinate lies outside the configured map.
    #[error("tile ({x}, {y}) lies outside the map")]
    OutOfBounds {
        /// Requested x coordinate.
        x: i32,
        /// Requested y coordinate.
        y: i32,
    },
    /// The element index is not below the tile's element count.
    #[error("element index {index} is out of range for a tile with {len} elements")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of elements on the tile.
        len: usize,
    },
    /// Raw tile data contains an element whose tag is not a known type.
    #[error("tile element {index} has invalid type tag {tag:#04x}")]
    InvalidElementTag {
        /// Index of the offending element.
        index: usize,
        /// Raw tag byte.
        tag: u8,
    },
    /// An identifier was registered twice.
    #[error("'{0}' is already registered")]
    AlreadyRegistered(String),
    /// A plugin load finished without registering plugin metadata.
    #[error("plugin did not register itself")]
    NotRegistered,
    /// The plugin requires a newer host.
    #[error("plugin requires API version {required} but the host provides {provided}")]
    UnsupportedApiVersion {
        /// Minimum version requested by the plugin.
        required: u32,
        /// Version implemented by the host.
        provided: u32,
    },
    /// No action is registered under the identifier.
    #[error("unknown game action '{0}'")]
    UnknownAction(String),
    /// Arguments are malformed.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    /// The referenced entity does not exist, or no longer exists.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Kind of entity that was looked up.
        kind: EntityKind,
        /// Numeric identifier that was looked up.
        id: u64,
    },
    /// The string does not name a permission.
    #[error("unknown permission '{0}'")]
    UnknownPermission(String),
    /// The string does not name a hook.
    #[error("unknown hook '{0}'")]
    UnknownHook(String),
    /// The default group cannot be removed.
    #[error("group {} is the default group and cannot be removed", .0.get())]
    DefaultGroupRemoval(GroupId),
    /// The caller lacks the permission required by the operation.
    #[error("permission '{0}' is required")]
    PermissionDenied(PermissionType),
    /// An action was requested while another action handler was running.
    #[error("game actions cannot be requested from inside an action handler")]
    NestedAction,
    /// The world is mutably borrowed by a running action handler.
    #[error("the world is being modified by an action handler")]
    WorldBusy,
    /// The operation is not available in the current network mode.
    #[error("operation requires network mode {expected} but the session is {actual}")]
    WrongNetworkMode {
        /// Mode the operation requires.
        expected: &'static str,
        /// Mode of the current session.
        actual: &'static str,
    },
}

impl ScriptError {
    /// Convenience constructor for [`ScriptError::NotFound`].
    #[must_use]
    pub fn not_found(kind: EntityKind, id: impl Into<u64>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ActionArgs, ActionStatus, Coord3, ExpenditureType, GameActionResult, HookType, MapSize,
        PermissionType, ScriptError, ScriptValue,
    };
    use serde::{de::DeserializeOwned, Serialize};

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn permission_tags_parse_back() {
        for permission in PermissionType::ALL {
            let parsed: PermissionType = permission.as_str().parse().expect("known tag");
            assert_eq!(parsed, permission);
        }
        assert_eq!(
            "fly".parse::<PermissionType>(),
            Err(ScriptError::UnknownPermission("fly".to_owned()))
        );
    }

    #[test]
    fn hook_names_parse_back() {
        let hook: HookType = "network.action".parse().expect("known hook");
        assert_eq!(hook, HookType::NetworkAction);
        assert!("interval.week".parse::<HookType>().is_err());
    }

    #[test]
    fn failure_results_carry_status_tag() {
        let result = GameActionResult::failure(ActionStatus::Disallowed, "Can't do that", "No");
        assert!(!result.is_success());
        assert_eq!(result.error, "disallowed");
        assert_eq!(result.cost, 0);
    }

    #[test]
    fn action_result_round_trips_through_bincode() {
        let result =
            GameActionResult::success(Coord3::new(64, 96, 16), 250, ExpenditureType::Landscaping);
        assert_round_trip(&result);
    }

    #[test]
    fn action_args_round_trip_through_bincode() {
        let args = ActionArgs::new()
            .with("x", 3)
            .with("name", "Loopy")
            .with("ratio", 0.5)
            .with("flag", true);
        assert_round_trip(&args);
    }

    #[test]
    fn infinite_floats_cross_the_wire() {
        assert_round_trip(&ScriptValue::Float(f64::INFINITY));
        assert_round_trip(&ScriptValue::Float(f64::NEG_INFINITY));
        let bytes = bincode::serialize(&ScriptValue::Float(f64::NAN)).expect("serialize");
        let restored: ScriptValue = bincode::deserialize(&bytes).expect("deserialize");
        assert!(matches!(restored, ScriptValue::Float(value) if value.is_nan()));
    }

    #[test]
    fn integer_arguments_are_validated() {
        let args = ActionArgs::new()
            .with("ride", 3)
            .with("name", "x")
            .with("big", 70_000);
        assert_eq!(args.int("ride"), Ok(3));
        assert!(matches!(args.int("name"), Err(ScriptError::InvalidArguments(_))));
        assert!(matches!(args.int("missing"), Err(ScriptError::InvalidArguments(_))));
        assert!(matches!(
            args.int_as::<u16>("big"),
            Err(ScriptError::InvalidArguments(_))
        ));
        assert_eq!(args.int_or("missing", 9), Ok(9));
        assert_eq!(args.get("name"), Some(&ScriptValue::Str("x".to_owned())));
    }

    #[test]
    fn map_size_rejects_negative_and_overflowing_coordinates() {
        let size = MapSize::new(4, 3);
        assert!(size.contains(0, 0));
        assert!(size.contains(3, 2));
        assert!(!size.contains(4, 0));
        assert!(!size.contains(0, 3));
        assert!(!size.contains(-1, 1));
        assert_eq!(size.tile_count(), 12);
    }
}
