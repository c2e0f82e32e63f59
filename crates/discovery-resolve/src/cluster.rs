//! The real `ClusterReader` over `kube::Client`. Constructing/authenticating
//! the client itself stays the caller's job (spec §1); this module only
//! turns a constructed client into the narrow read-only contract
//! `discovery-core::ClusterReader` defines.

use async_trait::async_trait;
use discovery_core::{ClusterError, ClusterReader, CrdSummary, Gvr, ListQuery, Resource, Scope};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, DynamicObject, ListParams};
use kube::Client;

pub struct KubeClusterReader {
    client: Client,
}

impl KubeClusterReader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api_for(&self, gvr: &Gvr, kind: &str, namespace: Option<&str>) -> Api<DynamicObject> {
        let resource = gvr.to_api_resource(kind);
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &resource),
            None => Api::all_with(self.client.clone(), &resource),
        }
    }
}

fn map_kube_error(err: kube::Error) -> ClusterError {
    match &err {
        kube::Error::Api(resp) if resp.code == 404 => ClusterError::NotFound,
        kube::Error::Api(resp) if resp.code == 403 => ClusterError::Forbidden,
        _ => ClusterError::Other(err.to_string()),
    }
}

#[async_trait]
impl ClusterReader for KubeClusterReader {
    async fn get(
        &self,
        gvr: &Gvr,
        kind: &str,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<Resource>, ClusterError> {
        let api = self.api_for(gvr, kind, namespace);
        match api.get(name).await {
            Ok(obj) => {
                let scope = if namespace.is_some() { Scope::Namespaced } else { Scope::ClusterScoped };
                let gvk = discovery_core::Gvk::new(gvr.group.clone(), gvr.version.clone(), kind.to_string());
                Ok(Some(Resource::from_dynamic(gvk, scope, obj)))
            }
            Err(kube::Error::Api(resp)) if resp.code == 404 => Ok(None),
            Err(err) => Err(map_kube_error(err)),
        }
    }

    async fn list(
        &self,
        gvr: &Gvr,
        kind: &str,
        namespace: Option<&str>,
        query: ListQuery,
    ) -> Result<Vec<Resource>, ClusterError> {
        let api = self.api_for(gvr, kind, namespace);
        let mut params = ListParams::default();
        if let Some(selector) = query.label_selector {
            params = params.labels(&selector);
        }
        if let Some(limit) = query.limit {
            params = params.limit(limit);
        }

        let list = api.list(&params).await.map_err(map_kube_error)?;
        let scope = if namespace.is_some() { Scope::Namespaced } else { Scope::ClusterScoped };
        let gvk = discovery_core::Gvk::new(gvr.group.clone(), gvr.version.clone(), kind.to_string());
        Ok(list
            .items
            .into_iter()
            .map(|obj| Resource::from_dynamic(gvk.clone(), scope, obj))
            .collect())
    }

    async fn list_crds(&self) -> Result<Vec<CrdSummary>, ClusterError> {
        let api: Api<CustomResourceDefinition> = Api::all(self.client.clone());
        let list = api.list(&ListParams::default()).await.map_err(map_kube_error)?;

        Ok(list
            .items
            .into_iter()
            .filter_map(|crd| {
                let spec = crd.spec;
                let group = spec.group;
                let kind = spec.names.kind;
                let plural = spec.names.plural;
                let scope = if spec.scope == "Namespaced" {
                    Scope::Namespaced
                } else {
                    Scope::ClusterScoped
                };
                let versions = spec
                    .versions
                    .into_iter()
                    .map(|v| {
                        let schema = v
                            .schema
                            .and_then(|s| s.open_apiv3_schema)
                            .and_then(|s| serde_json::to_value(s).ok());
                        (v.name, schema)
                    })
                    .collect();
                Some(CrdSummary { group, kind, plural, scope, versions })
            })
            .collect())
    }
}
