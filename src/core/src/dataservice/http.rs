//! GraphQL-over-HTTP Data Service client.
//!
//! Speaks the plain `{"query": …, "variables": …}` envelope against the CRM
//! endpoint. Connectivity failures (refused connections, timeouts) map to
//! `DataServiceUnreachable`, which jobs treat as fatal for the run; GraphQL
//! `errors` arrays map to query/mutation failures.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::filter::{CustomerFilter, OrderFilter, ProductFilter};
use super::{BulkItemOutcome, BulkResult, DataService};
use crate::error::{CrmError, ErrorCode, ErrorContext, FieldError, Result};
use crate::model::{Customer, NewCustomer, NewOrder, NewProduct, Order, Product};

const CUSTOMER_FIELDS: &str = "id name email phone createdAt";
const PRODUCT_FIELDS: &str = "id name price stock";
const ORDER_FIELDS: &str = "id customerId customerName customerEmail totalAmount orderDate \
                            items { productId productName quantity priceAtTime }";

/// HTTP client for the CRM GraphQL endpoint.
pub struct HttpDataService {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}


impl HttpDataService {
    /// Create a client for the given endpoint.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context_code(ErrorCode::ConfigurationError, "Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// Return the configured endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Execute one GraphQL operation and deserialize its `data` payload.
    async fn execute<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CrmError::with_internal(
                ErrorCode::QueryFailed,
                format!("Data Service returned HTTP {}", status),
                body,
            ));
        }

        let envelope: GraphQlResponse<T> = resp.json().await?;
        if !envelope.errors.is_empty() {
            let messages: Vec<&str> = envelope.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(CrmError::with_internal(
                ErrorCode::QueryFailed,
                "Data Service rejected the operation",
                messages.join("; "),
            ));
        }
        envelope
            .data
            .ok_or_else(|| CrmError::internal("GraphQL response had neither data nor errors"))
    }
}

#[async_trait::async_trait]
impl DataService for HttpDataService {
    async fn customers(&self, filter: CustomerFilter) -> Result<Vec<Customer>> {
        #[derive(Deserialize)]
        struct Data {
            customers: Vec<Customer>,
        }
        let query = format!(
            "query Customers($filter: CustomerFilterInput) {{ customers(filter: $filter) {{ {} }} }}",
            CUSTOMER_FIELDS
        );
        let data: Data = self
            .execute(&query, json!({ "filter": filter }))
            .await?;
        Ok(data.customers)
    }

    async fn products(&self, filter: ProductFilter) -> Result<Vec<Product>> {
        #[derive(Deserialize)]
        struct Data {
            products: Vec<Product>,
        }
        let query = format!(
            "query Products($filter: ProductFilterInput) {{ products(filter: $filter) {{ {} }} }}",
            PRODUCT_FIELDS
        );
        let data: Data = self.execute(&query, json!({ "filter": filter })).await?;
        Ok(data.products)
    }

    async fn orders(&self, filter: OrderFilter) -> Result<Vec<Order>> {
        #[derive(Deserialize)]
        struct Data {
            orders: Vec<Order>,
        }
        let query = format!(
            "query Orders($filter: OrderFilterInput) {{ orders(filter: $filter) {{ {} }} }}",
            ORDER_FIELDS
        );
        let data: Data = self.execute(&query, json!({ "filter": filter })).await?;
        Ok(data.orders)
    }

    async fn customer_count(&self) -> Result<u64> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Data {
            customer_count: u64,
        }
        let data: Data = self
            .execute("query { customerCount }", json!({}))
            .await?;
        Ok(data.customer_count)
    }

    async fn order_count(&self) -> Result<u64> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Data {
            order_count: u64,
        }
        let data: Data = self.execute("query { orderCount }", json!({})).await?;
        Ok(data.order_count)
    }

    async fn total_revenue(&self) -> Result<f64> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Data {
            total_revenue: f64,
        }
        let data: Data = self.execute("query { totalRevenue }", json!({})).await?;
        Ok(data.total_revenue)
    }

    async fn create_customer(&self, input: NewCustomer) -> Result<Customer> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Data {
            create_customer: Payload,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Payload {
            success: bool,
            #[serde(default)]
            message: Option<String>,
            #[serde(default)]
            field_errors: Vec<FieldError>,
            customer: Option<Customer>,
        }
        let query = format!(
            "mutation CreateCustomer($input: CustomerInput!) {{ createCustomer(input: $input) \
             {{ success message fieldErrors {{ field message }} customer {{ {} }} }} }}",
            CUSTOMER_FIELDS
        );
        let data: Data = self.execute(&query, json!({ "input": input })).await?;
        let payload = data.create_customer;
        if !payload.success {
            return Err(CrmError::validation(
                payload
                    .message
                    .unwrap_or_else(|| "Customer rejected".to_string()),
                payload.field_errors,
            ));
        }
        payload
            .customer
            .ok_or_else(|| CrmError::internal("createCustomer succeeded without a customer"))
    }

    async fn bulk_create_customers(&self, inputs: Vec<NewCustomer>) -> Result<BulkResult<Customer>> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Data {
            bulk_create_customers: BulkPayload,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct BulkPayload {
            results: Vec<BulkItem>,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct BulkItem {
            index: usize,
            customer: Option<Customer>,
            #[serde(default)]
            errors: Vec<FieldError>,
        }
        let query = format!(
            "mutation BulkCreateCustomers($inputs: [CustomerInput!]!) \
             {{ bulkCreateCustomers(inputs: $inputs) \
             {{ successCount errorCount results {{ index errors {{ field message }} customer {{ {} }} }} }} }}",
            CUSTOMER_FIELDS
        );
        let data: Data = self.execute(&query, json!({ "inputs": inputs })).await?;
        let outcomes = data
            .bulk_create_customers
            .results
            .into_iter()
            .map(|item| BulkItemOutcome {
                index: item.index,
                result: match item.customer {
                    Some(customer) => Ok(customer),
                    None => Err(item.errors),
                },
            })
            .collect();
        Ok(BulkResult::from_outcomes(outcomes))
    }

    async fn create_product(&self, input: NewProduct) -> Result<Product> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Data {
            create_product: Payload,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Payload {
            success: bool,
            #[serde(default)]
            message: Option<String>,
            #[serde(default)]
            field_errors: Vec<FieldError>,
            product: Option<Product>,
        }
        let query = format!(
            "mutation CreateProduct($input: ProductInput!) {{ createProduct(input: $input) \
             {{ success message fieldErrors {{ field message }} product {{ {} }} }} }}",
            PRODUCT_FIELDS
        );
        let data: Data = self.execute(&query, json!({ "input": input })).await?;
        let payload = data.create_product;
        if !payload.success {
            return Err(CrmError::validation(
                payload
                    .message
                    .unwrap_or_else(|| "Product rejected".to_string()),
                payload.field_errors,
            ));
        }
        payload
            .product
            .ok_or_else(|| CrmError::internal("createProduct succeeded without a product"))
    }

    async fn create_order(&self, input: NewOrder) -> Result<Order> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Data {
            create_order: Payload,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Payload {
            success: bool,
            #[serde(default)]
            message: Option<String>,
            #[serde(default)]
            field_errors: Vec<FieldError>,
            order: Option<Order>,
        }
        let query = format!(
            "mutation CreateOrder($input: OrderInput!) {{ createOrder(input: $input) \
             {{ success message fieldErrors {{ field message }} order {{ {} }} }} }}",
            ORDER_FIELDS
        );
        let data: Data = self.execute(&query, json!({ "input": input })).await?;
        let payload = data.create_order;
        if !payload.success {
            return Err(CrmError::validation(
                payload
                    .message
                    .unwrap_or_else(|| "Order rejected".to_string()),
                payload.field_errors,
            ));
        }
        payload
            .order
            .ok_or_else(|| CrmError::internal("createOrder succeeded without an order"))
    }

    async fn delete_customer(&self, id: &str) -> Result<()> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Data {
            delete_customer: DeletePayload,
        }
        #[derive(Deserialize)]
        struct DeletePayload {
            success: bool,
            #[serde(default)]
            message: Option<String>,
        }
        let query = "mutation DeleteCustomer($id: ID!) { deleteCustomer(id: $id) { success message } }";
        let data: Data = self.execute(query, json!({ "id": id })).await?;
        if data.delete_customer.success {
            Ok(())
        } else {
            Err(CrmError::with_internal(
                ErrorCode::MutationFailed,
                format!("customer {} could not be deleted", id),
                data.delete_customer.message.unwrap_or_default(),
            ))
        }
    }

    async fn restock_products(&self, ids: &[String], amount: u32) -> Result<Vec<Product>> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Data {
            restock_products: RestockPayload,
        }
        #[derive(Deserialize)]
        struct RestockPayload {
            success: bool,
            #[serde(default)]
            message: Option<String>,
            #[serde(default)]
            products: Vec<Product>,
        }
        let query = format!(
            "mutation RestockProducts($ids: [ID!]!, $amount: Int!) \
             {{ restockProducts(ids: $ids, amount: $amount) {{ success message products {{ {} }} }} }}",
            PRODUCT_FIELDS
        );
        let data: Data = self
            .execute(&query, json!({ "ids": ids, "amount": amount }))
            .await?;
        let payload = data.restock_products;
        if payload.success {
            Ok(payload.products)
        } else {
            Err(CrmError::with_internal(
                ErrorCode::MutationFailed,
                "restock batch was rolled back",
                payload.message.unwrap_or_default(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_service(body: serde_json::Value) -> (MockServer, HttpDataService) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;
        let svc = HttpDataService::new(
            &format!("{}/graphql", server.uri()),
            Duration::from_secs(5),
        )
        .unwrap();
        (server, svc)
    }

    #[tokio::test]
    async fn test_customers_query() {
        let (_server, svc) = mock_service(json!({
            "data": {
                "customers": [{
                    "id": "1",
                    "name": "Alice",
                    "email": "alice@example.com",
                    "phone": null,
                    "createdAt": "2025-01-15T10:00:00Z"
                }]
            }
        }))
        .await;
        let customers = svc.customers(CustomerFilter::default()).await.unwrap();
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0].email, "alice@example.com");
    }

    #[tokio::test]
    async fn test_graphql_errors_map_to_query_failed() {
        let (_server, svc) = mock_service(json!({
            "data": null,
            "errors": [{ "message": "Cannot query field \"customers\"" }]
        }))
        .await;
        let err = svc.customer_count().await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::QueryFailed);
        assert!(err.internal_message().unwrap().contains("Cannot query"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_unreachable() {
        // Nothing listens on port 1
        let svc =
            HttpDataService::new("http://127.0.0.1:1/graphql", Duration::from_secs(1)).unwrap();
        let err = svc.customer_count().await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::DataServiceUnreachable);
        assert!(err.is_fatal_for_run());
    }

    #[tokio::test]
    async fn test_rejected_mutation_maps_to_validation() {
        let (_server, svc) = mock_service(json!({
            "data": {
                "createCustomer": {
                    "success": false,
                    "message": "Email already exists",
                    "fieldErrors": [{ "field": "email", "message": "already exists" }],
                    "customer": null
                }
            }
        }))
        .await;
        let err = svc
            .create_customer(NewCustomer {
                name: "Alice".into(),
                email: "alice@example.com".into(),
                phone: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationFailed);
        assert_eq!(err.field_errors()[0].field, "email");
    }

    #[tokio::test]
    async fn test_create_product_returns_persisted_entity() {
        let (_server, svc) = mock_service(json!({
            "data": {
                "createProduct": {
                    "success": true,
                    "message": null,
                    "fieldErrors": [],
                    "product": { "id": "3", "name": "Lamp", "price": 19.5, "stock": 4 }
                }
            }
        }))
        .await;
        let product = svc
            .create_product(NewProduct {
                name: "Lamp".into(),
                price: 19.5,
                stock: 4,
            })
            .await
            .unwrap();
        assert_eq!(product.id, "3");
        assert_eq!(product.stock, 4);
    }

    #[tokio::test]
    async fn test_restock_rollback_maps_to_mutation_failed() {
        let (_server, svc) = mock_service(json!({
            "data": {
                "restockProducts": {
                    "success": false,
                    "message": "product 9 not found",
                    "products": []
                }
            }
        }))
        .await;
        let err = svc
            .restock_products(&["9".to_string()], 10)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::MutationFailed);
    }
}
