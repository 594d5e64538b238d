//! Read-only integration tests.

#[cfg(test)]
mod tests {
    use insales::{Query, Value};

    use crate::shop_client;

    #[tokio::test]
    #[ignore = "requires InSales credentials"]
    async fn test_should_fetch_account() {
        let client = shop_client();
        let account = client
            .get("/admin/account.xml", &Query::new())
            .await
            .expect("get account")
            .expect("account body");

        assert!(account.get("id").and_then(Value::as_i64).is_some(), "account should have an id");
    }

    #[tokio::test]
    #[ignore = "requires InSales credentials"]
    async fn test_should_page_through_products() {
        let client = shop_client();
        let products = client
            .get(
                "/admin/products.xml",
                &Query::new().param("per_page", 2).param("page", 1),
            )
            .await
            .expect("list products")
            .unwrap_or(Value::Array(Vec::new()));

        let products = products.as_array().expect("products should decode as an array");
        assert!(products.len() <= 2);
    }

    #[tokio::test]
    #[ignore = "requires InSales credentials"]
    async fn test_should_report_missing_resource() {
        let client = shop_client();
        let err = client
            .get("/admin/orders/0.xml", &Query::new())
            .await
            .expect_err("order 0 should not exist");
        assert_eq!(err.status(), Some(404));
    }
}
