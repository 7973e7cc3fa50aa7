use crate::completion::CompletionClient;
use crate::config::Config;
use crate::notifier::TaskNotifier;
use crate::task_hub::TaskHub;
use actix::Addr;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<TaskHub>,
    pub notifier: Addr<TaskNotifier>,
    pub completion: CompletionClient,
    pub config: Config,
}
