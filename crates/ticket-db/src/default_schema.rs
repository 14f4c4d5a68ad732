//! Default schema of the ticket tracker.

use crate::core::schema::{Column, Index, Table};

/// Schema version created by [`schema`]. Used for automatic upgrades.
pub const DB_VERSION: u32 = 45;

/// All tables of a fresh database, in creation order.
pub fn schema() -> Vec<Table> {
    vec![
        // Common
        Table::new("system")
            .key(["name"])
            .column(Column::new("name"))
            .column(Column::new("value")),
        Table::new("permission")
            .key(["username", "action"])
            .column(Column::new("username"))
            .column(Column::new("action")),
        Table::new("auth_cookie")
            .key(["cookie", "ipnr", "name"])
            .column(Column::new("cookie"))
            .column(Column::new("name"))
            .column(Column::new("ipnr"))
            .column(Column::new("time").typed("int")),
        Table::new("session")
            .key(["sid", "authenticated"])
            .column(Column::new("sid"))
            .column(Column::new("authenticated").typed("int"))
            .column(Column::new("last_visit").typed("int"))
            .index(Index::new(["last_visit"]))
            .index(Index::new(["authenticated"])),
        Table::new("session_attribute")
            .key(["sid", "authenticated", "name"])
            .column(Column::new("sid"))
            .column(Column::new("authenticated").typed("int"))
            .column(Column::new("name"))
            .column(Column::new("value")),
        Table::new("cache")
            .key(["id"])
            .column(Column::new("id").typed("int"))
            .column(Column::new("generation").typed("int"))
            .column(Column::new("key")),
        // Attachments
        Table::new("attachment")
            .key(["type", "id", "filename"])
            .column(Column::new("type"))
            .column(Column::new("id"))
            .column(Column::new("filename"))
            .column(Column::new("size").typed("int"))
            .column(Column::new("time").typed("int64"))
            .column(Column::new("description"))
            .column(Column::new("author")),
        // Wiki
        Table::new("wiki")
            .key(["name", "version"])
            .column(Column::new("name"))
            .column(Column::new("version").typed("int"))
            .column(Column::new("time").typed("int64"))
            .column(Column::new("author"))
            .column(Column::new("text"))
            .column(Column::new("comment"))
            .column(Column::new("readonly").typed("int"))
            .index(Index::new(["time"])),
        // Version control cache
        Table::new("repository")
            .key(["id", "name"])
            .column(Column::new("id").typed("int"))
            .column(Column::new("name"))
            .column(Column::new("value")),
        Table::new("revision")
            .key(["repos", "rev"])
            .column(Column::new("repos").typed("int"))
            .column(Column::new("rev").key_size(40))
            .column(Column::new("time").typed("int64"))
            .column(Column::new("author"))
            .column(Column::new("message"))
            .index(Index::new(["repos", "time"])),
        Table::new("node_change")
            .key(["id"])
            .column(Column::new("id").auto_increment())
            .column(Column::new("repos").typed("int"))
            .column(Column::new("rev").key_size(40))
            .column(Column::new("path").key_size(255))
            .column(Column::new("node_type").size(1))
            .column(Column::new("change_type").size(1))
            .column(Column::new("base_path"))
            .column(Column::new("base_rev"))
            .index(Index::new(["repos", "rev", "path"]))
            .index(Index::new(["repos", "path", "rev"])),
        // Tickets
        Table::new("ticket")
            .key(["id"])
            .column(Column::new("id").auto_increment())
            .column(Column::new("type"))
            .column(Column::new("time").typed("int64"))
            .column(Column::new("changetime").typed("int64"))
            .column(Column::new("component"))
            .column(Column::new("severity"))
            .column(Column::new("priority"))
            .column(Column::new("owner"))
            .column(Column::new("reporter"))
            .column(Column::new("cc"))
            .column(Column::new("version"))
            .column(Column::new("milestone"))
            .column(Column::new("status"))
            .column(Column::new("resolution"))
            .column(Column::new("summary"))
            .column(Column::new("description"))
            .column(Column::new("keywords"))
            .index(Index::new(["time"]))
            .index(Index::new(["status"])),
        Table::new("ticket_change")
            .key(["ticket", "time", "field"])
            .column(Column::new("ticket").typed("int"))
            .column(Column::new("time").typed("int64"))
            .column(Column::new("author"))
            .column(Column::new("field"))
            .column(Column::new("oldvalue"))
            .column(Column::new("newvalue"))
            .index(Index::new(["ticket"]))
            .index(Index::new(["time"])),
        Table::new("ticket_custom")
            .key(["ticket", "name"])
            .column(Column::new("ticket").typed("int"))
            .column(Column::new("name"))
            .column(Column::new("value")),
        Table::new("enum")
            .key(["type", "name"])
            .column(Column::new("type"))
            .column(Column::new("name"))
            .column(Column::new("value"))
            .column(Column::new("description")),
        Table::new("component")
            .key(["name"])
            .column(Column::new("name"))
            .column(Column::new("owner"))
            .column(Column::new("description")),
        Table::new("milestone")
            .key(["name"])
            .column(Column::new("name"))
            .column(Column::new("start").typed("int64"))
            .column(Column::new("due").typed("int64"))
            .column(Column::new("completed").typed("int64"))
            .column(Column::new("description")),
        Table::new("version")
            .key(["name"])
            .column(Column::new("name"))
            .column(Column::new("time").typed("int64"))
            .column(Column::new("description")),
        // Reports
        Table::new("report")
            .key(["id"])
            .column(Column::new("id").auto_increment())
            .column(Column::new("author"))
            .column(Column::new("title"))
            .column(Column::new("query"))
            .column(Column::new("description")),
        // Notifications
        Table::new("notify_subscription")
            .key(["id"])
            .column(Column::new("id").auto_increment())
            .column(Column::new("time").typed("int64"))
            .column(Column::new("changetime").typed("int64"))
            .column(Column::new("class"))
            .column(Column::new("sid"))
            .column(Column::new("authenticated").typed("int"))
            .column(Column::new("distributor"))
            .column(Column::new("format"))
            .column(Column::new("priority").typed("int"))
            .column(Column::new("adverb"))
            .index(Index::new(["sid", "authenticated"]))
            .index(Index::new(["class"])),
        Table::new("notify_watch")
            .key(["id"])
            .column(Column::new("id").auto_increment())
            .column(Column::new("sid"))
            .column(Column::new("authenticated").typed("int"))
            .column(Column::new("class"))
            .column(Column::new("realm"))
            .column(Column::new("target"))
            .index(Index::new(["sid", "authenticated", "class"]))
            .index(Index::new(["class", "realm", "target"])),
    ]
}
