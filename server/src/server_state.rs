use run_tracker_data_management::DataManager;
use run_tracker_session::{services::UserScope, SessionHandle};

pub struct ServerState {
    // Front door of the session actor. Also hands out event subscriptions.
    pub session: SessionHandle,
    pub data_manager: DataManager,
    pub user: UserScope,
}
