use clap::Args;
use console::style;

use super::connect;

#[derive(Args)]
pub struct LoginArgs {
    /// Account email
    #[arg(long)]
    email: String,
    /// Account password (will prompt if not provided)
    #[arg(long)]
    password: Option<String>,
}

pub async fn login(args: LoginArgs) -> anyhow::Result<()> {
    let password = match args.password {
        Some(p) => p,
        None => {
            eprint!("Password for {}: ", args.email);
            let mut input = String::new();
            std::io::stdin().read_line(&mut input)?;
            input.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    if password.is_empty() {
        anyhow::bail!("Password cannot be empty");
    }

    let (storefront, auth) = connect()?;
    let user = auth.login(&args.email, &password).await?;
    storefront.wait_until_loaded().await;

    println!(
        "{} Logged in as {} <{}>",
        style("✓").green(),
        style(&user.name).bold(),
        user.email
    );
    println!(
        "  wishlist: {} items | cart: {} items",
        storefront.wishlist().len(),
        storefront.cart().item_count()
    );
    Ok(())
}

pub async fn logout() -> anyhow::Result<()> {
    let (_storefront, auth) = connect()?;
    let was_signed_in = auth.restore().await?;
    auth.logout().await?;

    if was_signed_in {
        println!("{} Logged out", style("✓").green());
    } else {
        println!("Not logged in.");
    }
    Ok(())
}

pub async fn whoami() -> anyhow::Result<()> {
    let (storefront, auth) = connect()?;
    if !auth.restore().await? {
        println!("Not logged in. Use `pantry login` to sign in.");
        return Ok(());
    }

    let Some(user) = storefront.session().identity().current() else {
        anyhow::bail!("session restored without a user");
    };
    println!("Name:     {}", user.name);
    println!("Email:    {}", user.email);
    println!("Role:     {}", user.role);
    println!(
        "Verified: {}",
        if user.email_verified { "yes" } else { "no" }
    );
    Ok(())
}
