use std::sync::Arc;

use super::{
    admission::AdmissionController, config::Config, hub::BroadcastHub, identity::IdentityIssuer,
    query::QuerySurface, tally::TallyStore,
};

pub struct State {
    pub config: Config,
    pub issuer: Arc<IdentityIssuer>,
    pub hub: Arc<BroadcastHub>,
    pub admission: AdmissionController,
    pub query: QuerySurface,
}

impl State {
    pub fn new(config: Config) -> Arc<Self> {
        let store = Arc::new(TallyStore::new());
        let issuer = Arc::new(IdentityIssuer::new(
            config.token_secret.clone(),
            config.token_ttl,
        ));
        let hub = Arc::new(BroadcastHub::new(store.clone()));

        let admission = AdmissionController::new(issuer.clone(), store.clone(), hub.clone());
        let query = QuerySurface::new(store);

        Arc::new(Self {
            config,
            issuer,
            hub,
            admission,
            query,
        })
    }
}
