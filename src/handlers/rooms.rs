//! `rooms` resource: join, leave and broadcast to named groups.

use std::sync::Arc;

use anyhow::Context;
use serde_json::{Value, json};

use crate::domain::GLOBAL_KEY;
use crate::router::{ActionResult, ActionTable, Handler, HandlerContext, IncomingMessage};

/// Chat-room style broadcast groups on top of the subscription registry.
///
/// | action      | data                          | result                        |
/// |-------------|-------------------------------|-------------------------------|
/// | `join`      | `{"room": str}`               | `{"room", "members"}`         |
/// | `leave`     | `{"room": str}`               | `{"room", "left"}`            |
/// | `broadcast` | `{"room": str, "payload": *}` | `{"room", "delivered"}`       |
/// | `announce`  | `{"payload": *}`              | `{"delivered"}`               |
#[derive(Debug)]
pub struct RoomHandler {
    ctx: HandlerContext,
}

impl Handler for RoomHandler {
    const NAME: &'static str = "RoomHandler";

    fn new(ctx: HandlerContext) -> Self {
        Self { ctx }
    }

    fn actions() -> ActionTable<Self> {
        ActionTable::new()
            .action("join", Self::join)
            .action("leave", Self::leave)
            .action("broadcast", Self::broadcast)
            .action("announce", Self::announce)
    }
}

impl RoomHandler {
    async fn join(self: Arc<Self>, message: IncomingMessage) -> ActionResult {
        let room = room_name(&message)?;
        self.ctx.subscribe(room).await?;
        let members = self.ctx.registry().member_count(room);
        Ok(json!({"room": room, "members": members}))
    }

    async fn leave(self: Arc<Self>, message: IncomingMessage) -> ActionResult {
        let room = room_name(&message)?;
        let left = self.ctx.unsubscribe(room);
        Ok(json!({"room": room, "left": left}))
    }

    async fn broadcast(self: Arc<Self>, message: IncomingMessage) -> ActionResult {
        let room = room_name(&message)?;
        let payload = message.data_field("payload").cloned().unwrap_or(Value::Null);
        let delivered = self.ctx.publish(room, &payload);
        Ok(json!({"room": room, "delivered": delivered}))
    }

    async fn announce(self: Arc<Self>, message: IncomingMessage) -> ActionResult {
        let payload = message.data_field("payload").cloned().unwrap_or(Value::Null);
        let delivered = self.ctx.publish(GLOBAL_KEY, &payload);
        Ok(json!({"delivered": delivered}))
    }
}

fn room_name(message: &IncomingMessage) -> anyhow::Result<&str> {
    let room = message
        .data_str("room")
        .context("data.room must be a string")?;
    anyhow::ensure!(room != GLOBAL_KEY, "room name {GLOBAL_KEY} is reserved");
    Ok(room)
}
