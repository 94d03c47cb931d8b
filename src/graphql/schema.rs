use crate::graphql::resolvers::Query;
use crate::state::AppState;
use async_graphql::{EmptyMutation, EmptySubscription, Schema};

/// GraphQL context containing shared application state
pub struct GraphQLContext {
    pub state: AppState,
}

/// The read-only catalog schema
pub type GraphQLSchema = Schema<Query, EmptyMutation, EmptySubscription>;

pub fn create_schema(state: AppState) -> GraphQLSchema {
    Schema::build(Query, EmptyMutation, EmptySubscription)
        .data(GraphQLContext { state })
        .limit_depth(8)
        .finish()
}
