//! Image one-of rules.

use super::field::{ErrorList, FieldError, FieldPath};
use crate::crd::{
    AzureComputeGalleryImage, AzureMarketplaceImage, AzureSharedGalleryImage, Image, ImageSourceError,
};

/// Validate a VM image.
///
/// Exactly one variant must be set. Every variant that is present is
/// checked, so a request carrying two variants also learns what is wrong
/// with each of them.
pub fn validate_image(image: Option<&Image>, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    let Some(image) = image else {
        errs.push(FieldError::required(path.clone(), "an image must be specified"));
        return errs;
    };

    match image.source() {
        Err(ImageSourceError::Empty) => errs.push(FieldError::required(
            path.clone(),
            "You must supply an ID, Marketplace, SharedGallery or ComputeGallery image details",
        )),
        Err(ImageSourceError::TooManyDetails) => errs.push(FieldError::invalid_omit_value(
            path.clone(),
            "You must supply only one of ID, Marketplace, SharedGallery or ComputeGallery image details",
        )),
        Ok(_) => {}
    }

    if let Some(id) = &image.id {
        if id.is_empty() {
            errs.push(FieldError::required(path.child("id"), "An ID must be specified"));
        }
    }
    if let Some(mp) = &image.marketplace {
        errs.append(validate_marketplace_image(mp, &path.child("marketplace")));
    }
    if let Some(sig) = &image.shared_gallery {
        errs.append(validate_shared_gallery_image(sig, &path.child("sharedGallery")));
    }
    if let Some(cg) = &image.compute_gallery {
        errs.append(validate_compute_gallery_image(cg, &path.child("computeGallery")));
    }
    errs
}

fn require(errs: &mut ErrorList, value: &str, path: FieldPath, what: &str) {
    if value.is_empty() {
        errs.push(FieldError::required(path, format!("A {what} must be specified")));
    }
}

fn validate_marketplace_image(image: &AzureMarketplaceImage, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    require(&mut errs, &image.plan.publisher, path.child("publisher"), "publisher");
    require(&mut errs, &image.plan.offer, path.child("offer"), "offer");
    require(&mut errs, &image.plan.sku, path.child("sku"), "SKU");
    require(&mut errs, &image.version, path.child("version"), "version");
    errs
}

fn validate_shared_gallery_image(image: &AzureSharedGalleryImage, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    require(&mut errs, &image.subscription_id, path.child("subscriptionID"), "subscription ID");
    require(&mut errs, &image.resource_group, path.child("resourceGroup"), "resource group");
    require(&mut errs, &image.name, path.child("name"), "name");
    require(&mut errs, &image.gallery, path.child("gallery"), "gallery");
    require(&mut errs, &image.version, path.child("version"), "version");

    // Plan information is all-or-nothing.
    let plan = [
        ("publisher", &image.publisher),
        ("offer", &image.offer),
        ("sku", &image.sku),
    ];
    if plan.iter().any(|(_, v)| v.is_some()) {
        for (name, value) in plan {
            if value.as_deref().is_none_or(str::is_empty) {
                errs.push(FieldError::required(
                    path.child(name),
                    "publisher, offer and sku must be set together",
                ));
            }
        }
    }
    errs
}

fn validate_compute_gallery_image(image: &AzureComputeGalleryImage, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    require(&mut errs, &image.gallery, path.child("gallery"), "gallery");
    require(&mut errs, &image.name, path.child("name"), "name");
    require(&mut errs, &image.version, path.child("version"), "version");

    let has_subscription = image.subscription_id.as_deref().is_some_and(|s| !s.is_empty());
    let has_resource_group = image.resource_group.as_deref().is_some_and(|s| !s.is_empty());
    if has_subscription && !has_resource_group {
        errs.push(FieldError::required(
            path.child("resourceGroup"),
            "A resource group must be provided when subscriptionID is specified",
        ));
    }
    if has_resource_group && !has_subscription {
        errs.push(FieldError::required(
            path.child("subscriptionID"),
            "A subscription ID must be provided when resourceGroup is specified",
        ));
    }
    errs
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::crd::ImagePlan;
    use crate::validation::field::ErrorType;

    fn path() -> FieldPath {
        FieldPath::new("spec").child("image")
    }

    fn marketplace() -> AzureMarketplaceImage {
        AzureMarketplaceImage {
            plan: ImagePlan {
                publisher: "cncf-upstream".to_string(),
                offer: "capi".to_string(),
                sku: "ubuntu-2204-gen1".to_string(),
            },
            version: "latest".to_string(),
            third_party_image: false,
        }
    }

    #[test]
    fn test_missing_image_is_required() {
        let errs = validate_image(None, &path());
        assert_eq!(errs.len(), 1);
        assert_eq!(errs.iter().next().unwrap().error_type, ErrorType::Required);
    }

    #[test]
    fn test_valid_marketplace_image() {
        let image = Image {
            marketplace: Some(marketplace()),
            ..Default::default()
        };
        assert!(validate_image(Some(&image), &path()).is_empty());
    }

    #[test]
    fn test_too_many_details_is_single_invalid() {
        let image = Image {
            marketplace: Some(marketplace()),
            shared_gallery: Some(AzureSharedGalleryImage {
                subscription_id: "sub".to_string(),
                resource_group: "rg".to_string(),
                name: "img".to_string(),
                gallery: "gal".to_string(),
                version: "1.0.0".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let errs = validate_image(Some(&image), &path()).into_vec();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].error_type, ErrorType::Invalid);
        assert_eq!(errs[0].path.to_string(), "spec.image");
    }

    #[test]
    fn test_marketplace_fields_required() {
        let image = Image {
            marketplace: Some(AzureMarketplaceImage::default()),
            ..Default::default()
        };
        let paths: Vec<String> = validate_image(Some(&image), &path())
            .iter()
            .map(|e| e.path.to_string())
            .collect();
        assert_eq!(
            paths,
            vec![
                "spec.image.marketplace.publisher",
                "spec.image.marketplace.offer",
                "spec.image.marketplace.sku",
                "spec.image.marketplace.version",
            ]
        );
    }

    #[test]
    fn test_compute_gallery_pairing() {
        let mut cg = AzureComputeGalleryImage {
            gallery: "gal".to_string(),
            name: "img".to_string(),
            version: "1.0.0".to_string(),
            subscription_id: Some("sub".to_string()),
            ..Default::default()
        };
        let image = Image {
            compute_gallery: Some(cg.clone()),
            ..Default::default()
        };
        let errs = validate_image(Some(&image), &path()).into_vec();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].path.to_string(), "spec.image.computeGallery.resourceGroup");

        cg.resource_group = Some("rg".to_string());
        let image = Image {
            compute_gallery: Some(cg),
            ..Default::default()
        };
        assert!(validate_image(Some(&image), &path()).is_empty());
    }

    #[test]
    fn test_empty_id() {
        let image = Image {
            id: Some(String::new()),
            ..Default::default()
        };
        let errs = validate_image(Some(&image), &path()).into_vec();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].path.to_string(), "spec.image.id");
    }
}
