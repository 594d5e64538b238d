//! Page CRUD integration tests.

#[cfg(test)]
mod tests {
    use insales::{Query, Value};

    use crate::{shop_client, test_title};

    #[tokio::test]
    #[ignore = "requires InSales credentials"]
    async fn test_should_create_update_and_delete_page() {
        let client = shop_client();
        let title = test_title("page");

        let page = Value::record([
            ("title", Value::from(title.as_str())),
            ("content", Value::from("<p>Hello</p>")),
        ]);
        let created = client
            .create("/admin/pages.xml", "page", &page)
            .await
            .expect("create page")
            .expect("created page body");
        let id = created.get("id").and_then(Value::as_i64).expect("page id");
        assert_eq!(created.get("title").and_then(Value::as_str), Some(title.as_str()));

        let path = format!("/admin/pages/{id}.xml");
        let renamed = format!("{title}-renamed");
        client
            .update(&path, "page", &Value::record([("title", renamed.as_str())]))
            .await
            .expect("update page");

        let fetched = client
            .get(&path, &Query::new())
            .await
            .expect("get page")
            .expect("page body");
        assert_eq!(fetched.get("title").and_then(Value::as_str), Some(renamed.as_str()));

        client.delete(&path).await.expect("delete page");
        let err = client
            .get(&path, &Query::new())
            .await
            .expect_err("page should be gone");
        assert_eq!(err.status(), Some(404));
    }
}
