//! Handler registry: binds every `operationId` of `doc/openapi.yaml` to its
//! controller.

use std::sync::Arc;

use crate::app::AppState;
use crate::dispatcher::Dispatcher;
use crate::handlers::{auth, catalog, messaging, orders};

/// Every operation id served by [`register_all`].
pub const OPERATION_IDS: [&str; 24] = [
    "list_computer_items",
    "get_computer_item",
    "create_computer_item",
    "update_computer_item",
    "delete_computer_item",
    "register_user",
    "login_user",
    "get_profile",
    "update_profile",
    "submit_order",
    "start_whatsapp",
    "stop_whatsapp",
    "auto_start_whatsapp",
    "set_whatsapp_auto_start",
    "whatsapp_status",
    "whatsapp_status_terminal",
    "whatsapp_qr",
    "whatsapp_qr_terminal",
    "send_whatsapp_message",
    "check_whatsapp_number",
    "list_whatsapp_chats",
    "whatsapp_chats_terminal",
    "whatsapp_health",
    "whatsapp_webhook",
];

/// Spawn one coroutine per operation.
///
/// # Safety
///
/// Spawns `may` coroutines; configure the runtime (stack size) first.
pub unsafe fn register_all(dispatcher: &mut Dispatcher, state: &AppState) {
    let catalog = &state.catalog;
    let users = &state.users;
    let svc = &state.messaging;
    let api_base = state.public_api_base();

    unsafe {
        dispatcher.register_typed(
            "list_computer_items",
            catalog::ListItems {
                catalog: Arc::clone(catalog),
            },
        );
        dispatcher.register_typed(
            "get_computer_item",
            catalog::GetItem {
                catalog: Arc::clone(catalog),
            },
        );
        dispatcher.register_typed(
            "create_computer_item",
            catalog::CreateItem {
                catalog: Arc::clone(catalog),
            },
        );
        dispatcher.register_typed(
            "update_computer_item",
            catalog::UpdateItem {
                catalog: Arc::clone(catalog),
            },
        );
        dispatcher.register_typed(
            "delete_computer_item",
            catalog::DeleteItem {
                catalog: Arc::clone(catalog),
            },
        );

        dispatcher.register_typed(
            "register_user",
            auth::Register {
                users: Arc::clone(users),
            },
        );
        dispatcher.register_typed(
            "login_user",
            auth::Login {
                users: Arc::clone(users),
            },
        );
        dispatcher.register_typed(
            "get_profile",
            auth::GetProfile {
                users: Arc::clone(users),
            },
        );
        dispatcher.register_typed(
            "update_profile",
            auth::UpdateProfile {
                users: Arc::clone(users),
            },
        );

        dispatcher.register_typed(
            "submit_order",
            orders::SubmitOrder {
                messaging: Arc::clone(svc),
                notify_number: state.config.messaging.notify_number.clone(),
            },
        );

        dispatcher.register_typed(
            "start_whatsapp",
            messaging::Start {
                service: Arc::clone(svc),
            },
        );
        dispatcher.register_typed(
            "stop_whatsapp",
            messaging::Stop {
                service: Arc::clone(svc),
            },
        );
        dispatcher.register_typed(
            "auto_start_whatsapp",
            messaging::AutoStart {
                service: Arc::clone(svc),
            },
        );
        dispatcher.register_typed(
            "set_whatsapp_auto_start",
            messaging::SetAutoStart {
                service: Arc::clone(svc),
            },
        );
        dispatcher.register_typed(
            "whatsapp_status",
            messaging::Status {
                service: Arc::clone(svc),
            },
        );
        dispatcher.register_typed(
            "whatsapp_status_terminal",
            messaging::StatusTerminal {
                service: Arc::clone(svc),
                api_base: api_base.clone(),
            },
        );
        dispatcher.register_typed(
            "whatsapp_qr",
            messaging::Qr {
                service: Arc::clone(svc),
            },
        );
        dispatcher.register_typed(
            "whatsapp_qr_terminal",
            messaging::QrTerminal {
                service: Arc::clone(svc),
                api_base,
            },
        );
        dispatcher.register_typed(
            "send_whatsapp_message",
            messaging::SendMessage {
                service: Arc::clone(svc),
            },
        );
        dispatcher.register_typed(
            "check_whatsapp_number",
            messaging::CheckNumber {
                service: Arc::clone(svc),
            },
        );
        dispatcher.register_typed(
            "list_whatsapp_chats",
            messaging::Chats {
                service: Arc::clone(svc),
            },
        );
        dispatcher.register_typed(
            "whatsapp_chats_terminal",
            messaging::ChatsTerminal {
                service: Arc::clone(svc),
            },
        );
        dispatcher.register_typed(
            "whatsapp_health",
            messaging::Health {
                service: Arc::clone(svc),
            },
        );
        dispatcher.register_typed(
            "whatsapp_webhook",
            messaging::Webhook {
                service: Arc::clone(svc),
            },
        );
    }
}
