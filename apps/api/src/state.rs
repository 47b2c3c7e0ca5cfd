use jobgate_application::{PasswordResetService, ThrottleService, UserService};

use crate::api_config::StoreBackend;
use crate::client_identity::ClientAddressResolver;

#[derive(Clone)]
pub struct AppState {
    pub throttle_service: ThrottleService,
    pub throttle_store: StoreBackend,
    pub user_service: UserService,
    pub password_reset_service: PasswordResetService,
    pub client_addresses: ClientAddressResolver,
    pub upload_max_bytes: usize,
}
