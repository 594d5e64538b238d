//! Plural→singular element names for array serialization.
//!
//! An array is composed as `<products type="array">` with one `<product>` child
//! per item. The singular name cannot be guessed reliably (`categories`,
//! `prices-in-site-currency`, ...), so it comes from an explicit table and a
//! missing entry is a composing error.

use std::collections::HashMap;

/// Array element names known to the InSales admin API.
const INSALES_ARRAYS: &[(&str, &str)] = &[
    ("all-tags", "all-tag"),
    ("application-actions", "application-action"),
    ("application-charges", "application-charge"),
    ("application-widgets", "application-widget"),
    ("articles", "article"),
    ("blogs", "blog"),
    ("bonus-system-transactions", "bonus-system-transaction"),
    ("categories", "category"),
    ("characteristics", "characteristic"),
    ("client-groups", "client-group"),
    ("clients", "client"),
    ("collection-field-values", "collection-field-value"),
    ("collection-fields", "collection-field"),
    ("collection-filters", "collection-filter"),
    ("collection-ids", "collection-id"),
    ("collections", "collection"),
    ("collections-ids", "collections-id"),
    ("collects", "collect"),
    ("custom-statuses", "custom-status"),
    ("delivery-locations", "delivery-location"),
    ("delivery-locations-attributes", "delivery-locations-attribute"),
    ("delivery-zones", "delivery-zone"),
    ("delivery-zones-attributes", "delivery-zones-attribute"),
    ("description-translations", "description-translation"),
    ("discount-codes", "discount-code"),
    ("discount-collections", "discount-collection"),
    ("discount-order-lines-ids", "discount-order-lines-id"),
    ("discount-products-ids", "discount-products-id"),
    ("discounts", "discount"),
    ("discounts-attributes", "discounts-attribute"),
    ("domains", "domain"),
    ("errors", "error"),
    ("field-options", "field-option"),
    ("field-options-attributes", "field-options-attribute"),
    ("field-values-attributes", "field-values-attribute"),
    ("fields", "field"),
    ("fields-values", "fields-value"),
    ("fields-values-attributes", "fields-values-attribute"),
    ("files", "file"),
    ("images", "image"),
    ("js-tags", "js-tag"),
    ("locations", "location"),
    ("locations-attributes", "locations-attribute"),
    ("menu-items", "menu-item"),
    ("menus", "menu"),
    ("nil-classes", "nil-class"),
    ("option-names", "option-name"),
    ("option-values", "option-value"),
    ("options", "option"),
    ("options-attributes", "options-attribute"),
    ("order-changes", "order-change"),
    ("order-lines", "order-line"),
    ("order-lines-attributes", "order-lines-attribute"),
    ("orders", "order"),
    ("outlets", "outlet"),
    ("pages", "page"),
    ("payment-delivery-variants", "payment-delivery-variant"),
    ("payment-delivery-variants-attributes", "payment-delivery-variants-attribute"),
    ("pick-up-sources", "pick-up-source"),
    ("price-kinds", "price-kind"),
    ("prices", "price"),
    ("prices-in-site-currency", "price-in-site-currency"),
    ("product-bundle-components", "product-bundle-component"),
    ("product-bundle-components-attributes", "product-bundle-components-attribute"),
    ("product-field-values", "product-field-value"),
    ("product-field-values-attributes", "product-field-values-attribute"),
    ("products", "product"),
    ("properties", "property"),
    ("properties-attributes", "properties-attribute"),
    ("redirects", "redirect"),
    ("related-products", "related-product"),
    ("reviews", "review"),
    ("rules", "rule"),
    ("rules-attributes", "rules-attribute"),
    ("similar-ids", "similar-id"),
    ("stock-currencies", "stock-currency"),
    ("supplementary-ids", "supplementary-id"),
    ("tags", "tag"),
    ("tariffs", "tariff"),
    ("tariffs-attributes", "tariffs-attribute"),
    ("title-translations", "title-translation"),
    ("variant-field-values", "variant-field-value"),
    ("variant-field-values-attributes", "variant-field-values-attribute"),
    ("variants", "variant"),
    ("variants-attributes", "variants-attribute"),
    ("warnings", "warning"),
    ("webhooks", "webhook"),
];

/// Table mapping an array element's (plural) name to the name of its items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArrayNames {
    names: HashMap<String, String>,
}

impl ArrayNames {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The table of array elements used by the InSales admin API.
    ///
    /// # Examples
    ///
    /// ```
    /// use insales_xml::ArrayNames;
    ///
    /// let arrays = ArrayNames::insales();
    /// assert_eq!(arrays.get("order-lines"), Some("order-line"));
    /// assert_eq!(arrays.get("categories"), Some("category"));
    /// ```
    #[must_use]
    pub fn insales() -> Self {
        INSALES_ARRAYS.iter().copied().collect()
    }

    /// Register (or replace) the singular name for `plural`.
    pub fn insert(&mut self, plural: impl Into<String>, singular: impl Into<String>) {
        self.names.insert(plural.into(), singular.into());
    }

    /// Singular name registered for `plural`.
    #[must_use]
    pub fn get(&self, plural: &str) -> Option<&str> {
        self.names.get(plural).map(String::as_str)
    }

    /// Number of registered array names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<P: Into<String>, S: Into<String>> FromIterator<(P, S)> for ArrayNames {
    fn from_iter<I: IntoIterator<Item = (P, S)>>(iter: I) -> Self {
        let mut names = Self::new();
        names.extend(iter);
        names
    }
}

impl<P: Into<String>, S: Into<String>> Extend<(P, S)> for ArrayNames {
    fn extend<I: IntoIterator<Item = (P, S)>>(&mut self, iter: I) {
        for (plural, singular) in iter {
            self.insert(plural, singular);
        }
    }
}
