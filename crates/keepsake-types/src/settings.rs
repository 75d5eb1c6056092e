//! The site settings aggregate.
//!
//! [`SiteSettings`] is generic over the representation of its two asset
//! fields. The in-memory aggregate is `SiteSettings<AssetValue>` and is always
//! hydrated; the persisted and exported form is `SiteSettings<AssetRef>`,
//! whose asset fields may hold the `"stored_separately"` sentinel.
//!
//! Field names serialize in camelCase to stay compatible with documents
//! exported by earlier versions of the site.

use serde::{Deserialize, Serialize};

use crate::asset::{AssetKind, AssetRef, AssetValue};

/// Footer texts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FooterSettings {
    pub contact: String,
    pub about: String,
    pub terms: String,
    pub policy: String,
}

impl Default for FooterSettings {
    fn default() -> Self {
        Self {
            contact: "Contactez-nous pour toutes demandes.".into(),
            about: "Shalom Job Center est une plateforme dédiée à l'accompagnement des candidats \
                    et des recruteurs au Togo."
                .into(),
            terms: "En utilisant notre service, vous acceptez nos conditions d'utilisation.".into(),
            policy: "Nous respectons votre vie privée conformément à la réglementation en vigueur."
                .into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SocialLinks {
    pub facebook: String,
    pub twitter: String,
    pub instagram: String,
    pub linkedin: String,
}

impl Default for SocialLinks {
    fn default() -> Self {
        Self {
            facebook: "https://facebook.com".into(),
            twitter: "https://twitter.com".into(),
            instagram: "https://instagram.com".into(),
            linkedin: "https://linkedin.com".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReservationSettings {
    pub min_stay: u32,
    pub max_stay: u32,
    pub advance_booking_days: u32,
    pub instant_booking: bool,
}

impl Default for ReservationSettings {
    fn default() -> Self {
        Self {
            min_stay: 1,
            max_stay: 30,
            advance_booking_days: 90,
            instant_booking: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompanyInfo {
    pub address: String,
    pub phone: String,
    pub email: String,
    pub registration_number: String,
    pub map_location: String,
}

impl Default for CompanyInfo {
    fn default() -> Self {
        Self {
            address: "123 Rue de la Paix, Lomé, Togo".into(),
            phone: "+228 22 22 22 22".into(),
            email: "contact@shalomjobcenter.com".into(),
            registration_number: "SJC-2023-001".into(),
            map_location: "https://www.google.com/maps/embed?pb=!1m18!1m12!1m3!1d3966.12!2d1.2268!3d6.2405\
                           !2m3!1f0!2f0!3f0!3m2!1i1024!2i768!4f13.1!5e0!3m2!1sfr!2sfr"
                .into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NotificationSettings {
    pub email_notifications: bool,
    pub new_contact_form_alert: bool,
    pub contact_form_email_template: String,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            email_notifications: true,
            new_contact_form_alert: true,
            contact_form_email_template: "Bonjour Admin, \n\nVous avez reçu un nouveau message de \
                contact de la part de {{name}}. \n\nEmail: {{email}} \nSujet: {{subject}} \n\
                Message: {{message}} \n\nCordialement, \nVotre système de notification automatique"
                .into(),
        }
    }
}

/// Site-wide configuration record.
///
/// `A` is the representation of the `logo` and `favicon` fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    default,
    rename_all = "camelCase",
    bound(deserialize = "A: Deserialize<'de> + From<AssetValue>")
)]
pub struct SiteSettings<A = AssetValue> {
    pub site_name: String,
    pub site_description: String,
    pub logo: A,
    pub favicon: A,
    pub primary_color: String,
    pub secondary_color: String,
    pub font_family: String,
    pub border_radius: String,
    /// Disabled by product decision; every update forces it back to `false`.
    pub dark_mode: bool,
    pub default_language: String,
    pub default_currency: String,
    pub date_format: String,
    pub time_format: String,
    pub timezone: String,
    pub admin_email: String,
    pub support_email: String,
    pub phone_number: String,
    pub address: String,
    /// Megabytes.
    pub max_file_size: u32,
    pub allowed_file_types: String,
    pub image_compression: String,
    pub watermark_enabled: bool,
    pub watermark_opacity: f64,
    pub currency: String,
    pub test_mode: bool,
    pub commission_rate: f64,
    pub min_withdrawal_amount: u64,
    pub facebook_url: String,
    pub twitter_url: String,
    pub instagram_url: String,
    pub linkedin_url: String,
    pub youtube_url: String,
    pub enable_social_login: bool,
    pub enable_social_sharing: bool,
    pub footer: FooterSettings,
    pub social_links: SocialLinks,
    pub reservation_settings: ReservationSettings,
    pub company_info: CompanyInfo,
    pub notification_settings: NotificationSettings,
}

impl<A: From<AssetValue>> Default for SiteSettings<A> {
    fn default() -> Self {
        Self {
            site_name: "Shalom Job Center".into(),
            site_description: "Trouvez les meilleures opportunités d'emploi au Togo et dans toute \
                               l'Afrique de l'Ouest."
                .into(),
            logo: AssetValue::default_for(AssetKind::Logo).into(),
            favicon: AssetValue::default_for(AssetKind::Favicon).into(),
            primary_color: "#FFD700".into(),
            secondary_color: "#1F2937".into(),
            font_family: "Inter, sans-serif".into(),
            border_radius: "medium".into(),
            dark_mode: false,
            default_language: "fr".into(),
            default_currency: "XOF".into(),
            date_format: "DD/MM/YYYY".into(),
            time_format: "24h".into(),
            timezone: "Africa/Lome".into(),
            admin_email: "admin@shalomjobcenter.com".into(),
            support_email: "support@shalomjobcenter.com".into(),
            phone_number: "+228 22 22 22 22".into(),
            address: "123 Rue de la Paix, Lomé, Togo".into(),
            max_file_size: 5,
            allowed_file_types: "jpg,jpeg,png,pdf,doc,docx".into(),
            image_compression: "medium".into(),
            watermark_enabled: false,
            watermark_opacity: 0.3,
            currency: "XOF".into(),
            test_mode: true,
            commission_rate: 5.0,
            min_withdrawal_amount: 10_000,
            facebook_url: "https://facebook.com".into(),
            twitter_url: "https://twitter.com".into(),
            instagram_url: "https://instagram.com".into(),
            linkedin_url: "https://linkedin.com".into(),
            youtube_url: "https://youtube.com".into(),
            enable_social_login: true,
            enable_social_sharing: true,
            footer: FooterSettings::default(),
            social_links: SocialLinks::default(),
            reservation_settings: ReservationSettings::default(),
            company_info: CompanyInfo::default(),
            notification_settings: NotificationSettings::default(),
        }
    }
}

impl<A> SiteSettings<A> {
    /// The asset field for `kind`.
    pub fn asset(&self, kind: AssetKind) -> &A {
        match kind {
            AssetKind::Logo => &self.logo,
            AssetKind::Favicon => &self.favicon,
        }
    }

    pub fn set_asset(&mut self, kind: AssetKind, value: A) {
        match kind {
            AssetKind::Logo => self.logo = value,
            AssetKind::Favicon => self.favicon = value,
        }
    }

    /// Convert both asset fields, keeping every other field.
    pub fn map_assets<B>(self, mut f: impl FnMut(AssetKind, A) -> B) -> SiteSettings<B> {
        SiteSettings {
            logo: f(AssetKind::Logo, self.logo),
            favicon: f(AssetKind::Favicon, self.favicon),
            site_name: self.site_name,
            site_description: self.site_description,
            primary_color: self.primary_color,
            secondary_color: self.secondary_color,
            font_family: self.font_family,
            border_radius: self.border_radius,
            dark_mode: self.dark_mode,
            default_language: self.default_language,
            default_currency: self.default_currency,
            date_format: self.date_format,
            time_format: self.time_format,
            timezone: self.timezone,
            admin_email: self.admin_email,
            support_email: self.support_email,
            phone_number: self.phone_number,
            address: self.address,
            max_file_size: self.max_file_size,
            allowed_file_types: self.allowed_file_types,
            image_compression: self.image_compression,
            watermark_enabled: self.watermark_enabled,
            watermark_opacity: self.watermark_opacity,
            currency: self.currency,
            test_mode: self.test_mode,
            commission_rate: self.commission_rate,
            min_withdrawal_amount: self.min_withdrawal_amount,
            facebook_url: self.facebook_url,
            twitter_url: self.twitter_url,
            instagram_url: self.instagram_url,
            linkedin_url: self.linkedin_url,
            youtube_url: self.youtube_url,
            enable_social_login: self.enable_social_login,
            enable_social_sharing: self.enable_social_sharing,
            footer: self.footer,
            social_links: self.social_links,
            reservation_settings: self.reservation_settings,
            company_info: self.company_info,
            notification_settings: self.notification_settings,
        }
    }
}

impl SiteSettings<AssetValue> {
    /// The persisted form, with inline assets replaced by the sentinel.
    pub fn offloaded(&self) -> SiteSettings<AssetRef> {
        self.clone().map_assets(|_, value| value.offloaded())
    }
}
