/*!
table.rs - the command table.

Maps canonical, user-facing command names (hyphenated) to either a
built-in handler or a passthrough endpoint with its parameter list.
Read-only after construction; also the candidate universe for
"did you mean" suggestions.
*/

use std::collections::BTreeMap;
use std::fmt;

use super::params::ParamSpec;

/// Commands with bespoke behavior beyond one passthrough call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handler {
    Login,
    Logout,
    Register,
    Status,
    Raw,
    SellAll,
    Commands,
}

impl Handler {
    const ALL: [Handler; 7] = [
        Handler::Login,
        Handler::Logout,
        Handler::Register,
        Handler::Status,
        Handler::Raw,
        Handler::SellAll,
        Handler::Commands,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Handler::Login => "login",
            Handler::Logout => "logout",
            Handler::Register => "register",
            Handler::Status => "status",
            Handler::Raw => "raw",
            Handler::SellAll => "sell-all",
            Handler::Commands => "commands",
        }
    }

    fn params(self) -> &'static [&'static str] {
        match self {
            Handler::Login => &["cred_file?"],
            Handler::Register => &["username", "empire", "registration_code"],
            Handler::Raw => &["endpoint", "json_body?"],
            Handler::Logout | Handler::Status | Handler::SellAll | Handler::Commands => &[],
        }
    }
}

impl fmt::Display for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    Handler(Handler),
    Passthrough { endpoint: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEntry {
    pub name: String,
    pub kind: CommandKind,
    pub params: Vec<ParamSpec>,
}

/// Endpoint -> parameter notation (see `params.rs`).
const ENDPOINTS: &[(&str, &[&str])] = &[
    // navigation
    ("travel", &["target_poi"]),
    ("jump", &["target_system"]),
    ("dock", &[]),
    ("undock", &[]),
    ("find_route", &["target_system"]),
    ("search_systems", &["query"]),
    ("survey_system", &[]),
    ("get_map", &[]),
    // status / info
    ("get_status", &[]),
    ("get_cargo", &[]),
    ("get_nearby", &[]),
    ("get_system", &[]),
    ("get_poi", &[]),
    ("get_version", &[]),
    ("get_notifications", &[]),
    ("help", &["category?", "command?"]),
    // resources
    ("mine", &[]),
    ("refuel", &["item_id?", "quantity?:int"]),
    ("repair", &[]),
    ("jettison", &["item_id", "quantity:int"]),
    ("use_item", &["item_id?", "quantity?:int"]),
    // NPC market
    ("buy", &["item_id", "quantity:int"]),
    ("sell", &["item_id", "quantity:int"]),
    ("estimate_purchase", &["item_id", "quantity:int"]),
    ("analyze_market", &["item_id?", "page?:int"]),
    ("view_market", &["item_id?"]),
    // player market orders
    ("create_sell_order", &["item_id?", "quantity?:int", "price_each?:int", "orders?"]),
    ("create_buy_order", &["item_id?", "quantity?:int", "price_each?:int", "orders?"]),
    ("cancel_order", &["order_id?", "order_ids?"]),
    ("modify_order", &["order_id?", "new_price?:int", "orders?"]),
    ("view_orders", &[]),
    // combat
    ("attack", &["target_id", "weapon_idx?:int"]),
    ("scan", &["target_id"]),
    ("cloak", &["enable?:bool"]),
    ("self_destruct", &[]),
    ("loot_wreck", &["wreck_id", "item_id", "quantity:int"]),
    ("salvage_wreck", &["wreck_id"]),
    // ships and modules
    ("get_ships", &[]),
    ("buy_ship", &["ship_class"]),
    ("sell_ship", &["ship_id"]),
    ("switch_ship", &["ship_id"]),
    ("install_mod", &["module_id", "slot_idx?:int"]),
    ("uninstall_mod", &["module_id"]),
    // crafting and missions
    ("craft", &["recipe_id", "count?:int"]),
    ("accept_mission", &["mission_id"]),
    ("complete_mission", &["mission_id"]),
    ("abandon_mission", &["mission_id"]),
    ("decline_mission", &["template_id?"]),
    // storage and insurance
    ("view_storage", &[]),
    ("deposit_items", &["item_id", "quantity:int"]),
    ("withdraw_items", &["item_id", "quantity:int"]),
    ("deposit_credits", &["amount:int"]),
    ("withdraw_credits", &["amount:int"]),
    ("send_gift", &["recipient", "item_id?", "quantity?:int", "credits?:int", "message?"]),
    ("buy_insurance", &["ticks:int"]),
    ("claim_insurance", &[]),
    // trading between players
    ("get_trades", &[]),
    ("trade_offer", &["target_id", "credits?:int", "items?"]),
    ("trade_accept", &["trade_id"]),
    ("trade_decline", &["trade_id"]),
    ("trade_cancel", &["trade_id"]),
    // social
    ("chat", &["channel", "content", "target_id?"]),
    ("get_chat_history", &["channel", "limit?:int", "target_id?", "before?"]),
    ("set_status", &["status_message?", "clan_tag?"]),
    ("set_colors", &["primary_color", "secondary_color"]),
    ("set_anonymous", &["anonymous:bool"]),
    ("captains_log_add", &["entry"]),
    ("captains_log_get", &["index:int"]),
    ("captains_log_list", &["index?:int"]),
    ("get_notes", &[]),
    ("create_note", &["title?", "content?"]),
    ("write_note", &["note_id?", "content?"]),
    ("read_note", &["note_id?"]),
    ("forum_list", &["page?:int", "category?"]),
    ("forum_get_thread", &["thread_id"]),
    ("forum_create_thread", &["title", "content", "category?"]),
    ("forum_reply", &["thread_id", "content"]),
    ("forum_upvote", &["thread_id", "reply_id?"]),
    // factions
    ("faction_info", &["faction_id?"]),
    ("faction_list", &["offset?:int", "limit?:int"]),
    ("faction_get_invites", &[]),
    ("create_faction", &["name", "tag"]),
    ("join_faction", &["faction_id"]),
    ("leave_faction", &[]),
    ("faction_invite", &["player_id"]),
    ("faction_kick", &["player_id"]),
    ("faction_promote", &["player_id", "role_id"]),
    ("faction_declare_war", &["target_faction_id", "reason?"]),
    ("faction_propose_peace", &["target_faction_id", "terms?"]),
    ("faction_accept_peace", &["target_faction_id"]),
    // drones and bases
    ("get_drones", &[]),
    ("deploy_drone", &["drone_item_id?", "target_id?"]),
    ("recall_drone", &["drone_id?", "all?:bool"]),
    ("order_drone", &["command?", "target_id?"]),
    ("build_base", &["name?", "services?"]),
    ("get_base_cost", &["base_type?"]),
    ("set_home_base", &["base_id"]),
    ("attack_base", &["base_id?"]),
    ("raid_status", &["base_id?"]),
    // queue
    ("get_queue", &[]),
    ("clear_queue", &[]),
];

/// Friendly names for common endpoints.
const ALIASES: &[(&str, &str)] = &[
    ("cargo", "get_cargo"),
    ("nearby", "get_nearby"),
    ("system", "get_system"),
    ("poi", "get_poi"),
    ("notifications", "get_notifications"),
    ("log", "captains_log_list"),
    ("log-add", "captains_log_add"),
    ("notes", "get_notes"),
    ("trades", "get_trades"),
    ("ships", "get_ships"),
    ("drones", "get_drones"),
    ("chat-history", "get_chat_history"),
    ("faction-invites", "faction_get_invites"),
    ("forum", "forum_list"),
    ("market", "view_market"),
];

#[derive(Debug, Clone, Default)]
pub struct CommandTable {
    entries: BTreeMap<String, CommandEntry>,
}

impl CommandTable {
    /// The full built-in table: every endpoint under its hyphenated name,
    /// the aliases, then the handlers (which win on a name clash).
    pub fn builtin() -> Self {
        let mut table = CommandTable::default();
        for (endpoint, params) in ENDPOINTS {
            table.insert_passthrough(&endpoint.replace('_', "-"), endpoint, params);
        }
        for (alias, endpoint) in ALIASES {
            let params = ENDPOINTS
                .iter()
                .find(|(e, _)| e == endpoint)
                .map(|(_, p)| *p)
                .unwrap_or(&[]);
            table.insert_passthrough(alias, endpoint, params);
        }
        for handler in Handler::ALL {
            table.entries.insert(
                handler.name().to_string(),
                CommandEntry {
                    name: handler.name().to_string(),
                    kind: CommandKind::Handler(handler),
                    params: ParamSpec::parse_all(handler.params()),
                },
            );
        }
        table
    }

    pub fn insert_passthrough(&mut self, name: &str, endpoint: &'static str, params: &[&str]) {
        self.entries.insert(
            name.to_string(),
            CommandEntry {
                name: name.to_string(),
                kind: CommandKind::Passthrough { endpoint },
                params: ParamSpec::parse_all(params),
            },
        );
    }

    /// Canonical form of a typed name: trimmed, lowercase, `_` -> `-`.
    pub fn normalize(typed: &str) -> String {
        typed.trim().to_lowercase().replace('_', "-")
    }

    /// Exact lookup after normalisation.
    pub fn lookup(&self, typed: &str) -> Option<&CommandEntry> {
        self.entries.get(&Self::normalize(typed))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = &CommandEntry> {
        self.entries.values()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
