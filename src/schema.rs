//! GraphQL schema.
//!
//! ```graphql
//! type RootQuery { cosmonauts: [Cosmonaut!]! superpowers: [Superpower!]! }
//! type RootMutation {
//!   createCosmonaut(inputCosmonaut: InputCosmonaut!): Cosmonaut
//!   modifyCosmonaut(cosmonautId: ID!, inputCosmonaut: InputCosmonaut!): Cosmonaut
//!   removeCosmonaut(cosmonautId: ID!): Cosmonaut
//!   createSuperpower(inputSuperpower: InputSuperpower!): Superpower
//!   modifySuperpower(superpowerId: ID!, inputSuperpower: InputSuperpower!): Superpower
//!   removeSuperpower(superpowerId: ID!): Superpower
//! }
//! ```
//!
//! Every resolver expects a [`RequestScope`] in the request data. Failures
//! carry their [`ApiError::code`] under `extensions.code`.

use async_graphql::{
    Context, EmptySubscription, Error, ErrorExtensions, InputObject, Object, Result, Schema, ID,
};

use crate::cosmonaut::CosmonautInput;
use crate::error::ApiError;
use crate::operations;
use crate::resolve::{CosmonautView, RequestScope, SuperpowerView};
use crate::superpower::SuperpowerInput;

/// Deepest selection accepted. Links can nest without bound otherwise.
const MAX_QUERY_DEPTH: usize = 10;

/// The executable schema.
pub type CosmoSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Builds the schema. Stores are supplied per request, not here.
#[must_use]
pub fn build_schema() -> CosmoSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .limit_depth(MAX_QUERY_DEPTH)
        .finish()
}

impl ErrorExtensions for ApiError {
    fn extend(&self) -> Error {
        Error::new(self.to_string()).extend_with(|_, e| e.set("code", self.code().to_string()))
    }
}

fn scope<'a>(ctx: &Context<'a>) -> Result<&'a RequestScope> {
    ctx.data_opt::<RequestScope>()
        .ok_or_else(|| ApiError::internal("request executed without a RequestScope").extend())
}

/// Cosmonaut fields as supplied by clients.
#[derive(Debug, Clone, InputObject)]
pub struct InputCosmonaut {
    /// First name.
    pub firstname: String,
    /// Last name.
    pub lastname: String,
    /// `YYYY-MM-DD` or an RFC 3339 timestamp.
    pub birthday: String,
    /// Id of the superpower to hold, if any.
    pub superpower: Option<ID>,
}

impl From<InputCosmonaut> for CosmonautInput {
    fn from(input: InputCosmonaut) -> Self {
        Self {
            firstname: input.firstname,
            lastname: input.lastname,
            birthday: input.birthday,
            superpower: input.superpower.map(|id| id.0),
        }
    }
}

/// Superpower fields as supplied by clients.
#[derive(Debug, Clone, InputObject)]
pub struct InputSuperpower {
    /// Display name.
    pub name: String,
}

impl From<InputSuperpower> for SuperpowerInput {
    fn from(input: InputSuperpower) -> Self {
        Self { name: input.name }
    }
}

#[Object(name = "Cosmonaut")]
impl CosmonautView {
    #[graphql(name = "_id")]
    async fn id(&self) -> ID {
        ID(self.id.to_string())
    }

    async fn firstname(&self) -> &str {
        &self.firstname
    }

    async fn lastname(&self) -> &str {
        &self.lastname
    }

    async fn birthday(&self) -> &str {
        &self.birthday
    }

    async fn superpower(&self, ctx: &Context<'_>) -> Result<Option<SuperpowerView>> {
        self.superpower
            .resolve(scope(ctx)?)
            .await
            .map_err(|e| e.extend())
    }
}

#[Object(name = "Superpower")]
impl SuperpowerView {
    #[graphql(name = "_id")]
    async fn id(&self) -> ID {
        ID(self.id.to_string())
    }

    async fn name(&self) -> &str {
        &self.name
    }

    async fn users(&self, ctx: &Context<'_>) -> Result<Vec<CosmonautView>> {
        self.users.resolve(scope(ctx)?).await.map_err(|e| e.extend())
    }
}

/// Read entry points.
pub struct QueryRoot;

#[Object(name = "RootQuery")]
impl QueryRoot {
    async fn cosmonauts(&self, ctx: &Context<'_>) -> Result<Vec<CosmonautView>> {
        operations::list_cosmonauts(scope(ctx)?)
            .await
            .map_err(|e| e.extend())
    }

    async fn superpowers(&self, ctx: &Context<'_>) -> Result<Vec<SuperpowerView>> {
        operations::list_superpowers(scope(ctx)?)
            .await
            .map_err(|e| e.extend())
    }
}

/// Write entry points. Results are nullable so one failed mutation does not
/// void its siblings.
pub struct MutationRoot;

#[Object(name = "RootMutation")]
impl MutationRoot {
    async fn create_cosmonaut(
        &self,
        ctx: &Context<'_>,
        input_cosmonaut: InputCosmonaut,
    ) -> Result<Option<CosmonautView>> {
        operations::create_cosmonaut(scope(ctx)?, &input_cosmonaut.into())
            .await
            .map(Some)
            .map_err(|e| e.extend())
    }

    async fn modify_cosmonaut(
        &self,
        ctx: &Context<'_>,
        cosmonaut_id: ID,
        input_cosmonaut: InputCosmonaut,
    ) -> Result<Option<CosmonautView>> {
        operations::modify_cosmonaut(scope(ctx)?, &cosmonaut_id, &input_cosmonaut.into())
            .await
            .map(Some)
            .map_err(|e| e.extend())
    }

    async fn remove_cosmonaut(
        &self,
        ctx: &Context<'_>,
        cosmonaut_id: ID,
    ) -> Result<Option<CosmonautView>> {
        operations::remove_cosmonaut(scope(ctx)?, &cosmonaut_id)
            .await
            .map(Some)
            .map_err(|e| e.extend())
    }

    async fn create_superpower(
        &self,
        ctx: &Context<'_>,
        input_superpower: InputSuperpower,
    ) -> Result<Option<SuperpowerView>> {
        operations::create_superpower(scope(ctx)?, &input_superpower.into())
            .await
            .map(Some)
            .map_err(|e| e.extend())
    }

    async fn modify_superpower(
        &self,
        ctx: &Context<'_>,
        superpower_id: ID,
        input_superpower: InputSuperpower,
    ) -> Result<Option<SuperpowerView>> {
        operations::modify_superpower(scope(ctx)?, &superpower_id, &input_superpower.into())
            .await
            .map(Some)
            .map_err(|e| e.extend())
    }

    async fn remove_superpower(
        &self,
        ctx: &Context<'_>,
        superpower_id: ID,
    ) -> Result<Option<SuperpowerView>> {
        operations::remove_superpower(scope(ctx)?, &superpower_id)
            .await
            .map(Some)
            .map_err(|e| e.extend())
    }
}
